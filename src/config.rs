use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use serde::Deserialize;

use crate::control::DeskConfig;
use crate::model::*;
use crate::util::misc::*;
use crate::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Transport {
    Ws,
    Tcp,
}

// 起動時の設定 (-cで指定したJSONファイルの後にコマンドライン引数を適用)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub addr: String,
    pub transport: Transport,
    pub init_coin: i64,          // ゲストに付与する房卡
    pub dissolve_timeout: u64,   // 秒
    pub offline_grace: u64,      // 秒
    pub action_timeout: u64,     // 秒 (0は無期限)
    pub deck: usize,             // 72 | 108
    pub card_cost: HashMap<usize, i64>, // 局数 -> 房卡
    pub verbose: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:33300".to_string(),
            transport: Transport::Ws,
            init_coin: 10,
            dissolve_timeout: 60,
            offline_grace: 15,
            action_timeout: 0,
            deck: DECK_72,
            card_cost: HashMap::new(),
            verbose: false,
        }
    }
}

impl ServerConfig {
    pub fn from_args(args: &[String]) -> Res<Self> {
        // 設定ファイルを先に読み込む
        let mut conf = Self::default();
        let mut it = args.iter();
        while let Some(s) = it.next() {
            if s == "-c" {
                let path: String = next_value(&mut it, s);
                conf = serde_json::from_str(&read_file(&path)?)?;
                info!("config loaded: {}", path);
            }
        }

        let mut it = args.iter();
        while let Some(s) = it.next() {
            match s.as_str() {
                "-c" => {
                    let _: String = next_value(&mut it, s);
                }
                "-a" => conf.addr = next_value(&mut it, s),
                "-tcp" => conf.transport = Transport::Tcp,
                "-coin" => conf.init_coin = next_value(&mut it, s),
                "-dissolve" => conf.dissolve_timeout = next_value(&mut it, s),
                "-grace" => conf.offline_grace = next_value(&mut it, s),
                "-timeout" => conf.action_timeout = next_value(&mut it, s),
                "-deck" => conf.deck = next_value(&mut it, s),
                "-v" => conf.verbose = true,
                opt => {
                    return Err(format!("unknown option: {}", opt).into());
                }
            }
        }

        if conf.deck != DECK_72 && conf.deck != DECK_108 {
            return Err(format!("unsupported deck size: {}", conf.deck).into());
        }
        Ok(conf)
    }

    pub fn desk_config(&self) -> DeskConfig {
        DeskConfig {
            deck: self.deck,
            dissolve_timeout: Duration::from_secs(self.dissolve_timeout),
            offline_grace: Duration::from_secs(self.offline_grace),
            action_timeout: if self.action_timeout == 0 {
                None
            } else {
                Some(Duration::from_secs(self.action_timeout))
            },
        }
    }
}

// [Card cost]
// 卓作成時に消費する房卡 (プロセス全体で共有)
static CARD_COST: RwLock<Option<HashMap<usize, i64>>> = RwLock::new(None);

fn default_cost(max_round: usize) -> i64 {
    match max_round {
        1 => 1,
        4 => 2,
        8 => 3,
        16 => 4,
        _ => 0,
    }
}

// 指定のない局数は既定値
pub fn init_card_cost(table: HashMap<usize, i64>) {
    match CARD_COST.write() {
        Ok(mut c) => *c = Some(table),
        Err(e) => error!("card cost init failed: {}", e),
    }
}

pub fn shutdown_card_cost() {
    if let Ok(mut c) = CARD_COST.write() {
        *c = None;
    }
}

pub fn card_cost(max_round: usize) -> i64 {
    CARD_COST
        .read()
        .ok()
        .and_then(|c| c.as_ref().and_then(|t| t.get(&max_round).copied()))
        .unwrap_or_else(|| default_cost(max_round))
}

#[test]
fn test_args() {
    let args: Vec<String> = ["-a", "0.0.0.0:4000", "-tcp", "-timeout", "30", "-v"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let conf = ServerConfig::from_args(&args).unwrap();
    assert_eq!(conf.addr, "0.0.0.0:4000");
    assert_eq!(conf.transport, Transport::Tcp);
    assert!(conf.verbose);
    let dc = conf.desk_config();
    assert_eq!(dc.action_timeout, Some(Duration::from_secs(30)));
    assert_eq!(dc.dissolve_timeout, Duration::from_secs(60));

    let args = vec!["-deck".to_string(), "100".to_string()];
    assert!(ServerConfig::from_args(&args).is_err());
    let args = vec!["-x".to_string()];
    assert!(ServerConfig::from_args(&args).is_err());

    let conf: ServerConfig =
        serde_json::from_str(r#"{"transport":"Tcp","cardCost":{"4":5}}"#).unwrap();
    assert_eq!(conf.transport, Transport::Tcp);
    assert_eq!(conf.card_cost.get(&4), Some(&5));
    assert_eq!(conf.deck, DECK_72);
}

#[test]
fn test_card_cost() {
    assert_eq!(default_cost(1), 1);
    assert_eq!(default_cost(4), 2);
    assert_eq!(default_cost(8), 3);
    assert_eq!(default_cost(16), 4);
    assert_eq!(default_cost(5), 0);
}
