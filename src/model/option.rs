use super::*;
use crate::error::{ErrorCode, GameResult};

pub const ZIMO_FAN: &str = "fan";

// 卓作成時にクライアントが指定するルール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeskOptions {
    pub mode: usize,      // 人数 (3 | 4)
    pub max_round: usize, // 局数 (1 | 4 | 8 | 16)
    pub max_fan: usize,   // 番数の上限 (0は上限なし)
    pub zimo: String,     // "fan": 自摸で1番加算, それ以外: 精算時に支払い2倍
    pub menqing: bool,    // 門清,中張
    pub jiangdui: bool,   // 将対 (2,5,8のみ)
    pub jiaxin: bool,     // 夾心五
    pub pengpeng: bool,   // 対々和の加算
    pub pinghu: bool,     // 0番の出和了を許可
    pub yaojiu: bool,     // 幺九
}

impl Default for DeskOptions {
    fn default() -> Self {
        Self {
            mode: 4,
            max_round: 4,
            max_fan: 0,
            zimo: String::new(),
            menqing: false,
            jiangdui: false,
            jiaxin: false,
            pengpeng: false,
            pinghu: false,
            yaojiu: false,
        }
    }
}

impl DeskOptions {
    pub fn validate(&self) -> GameResult {
        if self.mode != 3 && self.mode != 4 {
            return Err(ErrorCode::InvalidParameter);
        }
        if ![1, 4, 8, 16].contains(&self.max_round) {
            return Err(ErrorCode::InvalidParameter);
        }
        if !self.zimo.is_empty() && self.zimo != ZIMO_FAN {
            return Err(ErrorCode::InvalidParameter);
        }
        Ok(())
    }

    #[inline]
    pub fn is_zimo_fan(&self) -> bool {
        self.zimo == ZIMO_FAN
    }
}

#[test]
fn test_validate() {
    assert!(DeskOptions::default().validate().is_ok());
    let mut opts = DeskOptions {
        mode: 2,
        ..Default::default()
    };
    assert_eq!(opts.validate(), Err(ErrorCode::InvalidParameter));
    opts.mode = 3;
    opts.max_round = 5;
    assert_eq!(opts.validate(), Err(ErrorCode::InvalidParameter));

    let opts: DeskOptions = serde_json::from_str(r#"{"mode":3,"maxRound":8,"zimo":"fan"}"#).unwrap();
    assert!(opts.validate().is_ok());
    assert!(opts.is_zimo_fan());
}
