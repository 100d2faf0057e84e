use std::collections::HashMap;
use std::sync::Mutex;

use rand::prelude::*;

use super::desk::DeskMessage;
use super::runner::DeskHandle;
use crate::error::{ErrorCode, GameResult};
use crate::model::*;
use crate::{debug, info, warn};

#[derive(Debug, Default)]
struct Inner {
    desks: HashMap<DeskNo, DeskHandle>,
    players: HashMap<Uid, DeskNo>, // 着席中の卓
}

// 部屋番号 -> 卓 の対応表 (プロセス全体で共有)
#[derive(Debug, Default)]
pub struct DeskRegistry {
    inner: Mutex<Inner>,
}

impl DeskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    // 未使用の6桁の番号を割り当ててspawnで卓を起動する
    // 番号の割り当てから作成者の着席の登録まではロックを保持
    pub fn create<F>(&self, creator: Uid, spawn: F) -> GameResult<DeskHandle>
    where
        F: FnOnce(&str) -> GameResult<DeskHandle>,
    {
        let mut inner = self.lock();
        if inner.players.contains_key(&creator) {
            return Err(ErrorCode::IllegalDeskStatus);
        }
        let mut rng = thread_rng();
        let desk_no = loop {
            let no = format!("{:06}", rng.gen_range(0..1_000_000));
            if !inner.desks.contains_key(&no) {
                break no;
            }
        };
        let handle = spawn(&desk_no)?;
        inner.desks.insert(desk_no.clone(), handle.clone());
        inner.players.insert(creator, desk_no.clone());
        info!("desk {} registered ({} live)", desk_no, inner.desks.len());
        Ok(handle)
    }

    pub fn get(&self, desk_no: &str) -> GameResult<DeskHandle> {
        self.lock()
            .desks
            .get(desk_no)
            .cloned()
            .ok_or(ErrorCode::DeskNotFound)
    }

    pub fn desk_of(&self, uid: Uid) -> Option<DeskNo> {
        self.lock().players.get(&uid).cloned()
    }

    pub fn set_seat(&self, uid: Uid, desk_no: Option<&str>) {
        let mut inner = self.lock();
        match desk_no {
            Some(no) => {
                if let Some(old) = inner.players.insert(uid, no.to_string()) {
                    if old != no {
                        warn!("{} moved from desk {} to {}", uid, old, no);
                    }
                }
            }
            None => {
                inner.players.remove(&uid);
            }
        }
    }

    pub fn remove(&self, desk_no: &str) {
        let mut inner = self.lock();
        if inner.desks.remove(desk_no).is_some() {
            inner.players.retain(|_, no| no != desk_no);
            debug!("desk {} unregistered", desk_no);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().desks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // 全ての卓を終了させる
    pub fn shutdown(&self) {
        let handles: Vec<DeskHandle> = self.lock().desks.values().cloned().collect();
        info!("shutdown {} desks", handles.len());
        for h in handles {
            h.send(DeskMessage::Die).ok();
        }
    }
}

#[test]
fn test_registry() {
    use std::sync::mpsc;

    let reg = DeskRegistry::new();
    let mut rxs = vec![];
    let mut nos = vec![];
    for k in 0..20 {
        let h = reg
            .create(100 + k, |no| {
                let (tx, rx) = mpsc::channel();
                rxs.push(rx);
                Ok(DeskHandle::new(no, tx))
            })
            .unwrap();
        assert_eq!(h.desk_no().len(), 6);
        assert_eq!(reg.desk_of(100 + k).as_deref(), Some(h.desk_no()));
        nos.push(h.desk_no().to_string());
    }
    nos.sort();
    nos.dedup();
    assert_eq!(nos.len(), 20);
    assert_eq!(reg.len(), 20);

    // 作成者は卓の起動前から着席扱い
    let res = reg.create(100, |_| panic!("spawned twice"));
    assert_eq!(res.unwrap_err(), ErrorCode::IllegalDeskStatus);
    assert_eq!(reg.len(), 20);

    reg.set_seat(1, Some(&nos[0]));
    assert_eq!(reg.desk_of(1), Some(nos[0].clone()));
    reg.remove(&nos[0]);
    assert_eq!(reg.desk_of(1), None);
    assert_eq!(reg.get(&nos[0]).unwrap_err(), ErrorCode::DeskNotFound);

    reg.shutdown();
    assert!(matches!(rxs[1].try_recv(), Ok(DeskMessage::Die)));

    // 生成に失敗した場合は登録しない
    let res = reg.create(1, |_| Err(ErrorCode::DBOperation));
    assert_eq!(res.unwrap_err(), ErrorCode::DBOperation);
    assert_eq!(reg.len(), 19);
    assert_eq!(reg.desk_of(1), None);
}
