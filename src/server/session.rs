use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, MutexGuard};

use crate::model::*;
use crate::{debug, info};

// 接続スレッドへの出力
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(ServerFrame),
    Kick(String), // onKickを送って切断
}

#[derive(Debug)]
struct Session {
    sid: u64,
    tx: mpsc::Sender<Outbound>,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<Uid, Session>,
    pending: HashMap<Uid, Vec<ServerFrame>>, // 切断中に終了した卓の結果
}

// uid -> 接続 の対応表 (プロセス全体で共有)
// 1つのuidに対して有効な接続は常に1つ
#[derive(Debug, Default)]
pub struct SessionRegistry {
    inner: Mutex<Inner>,
    next_sid: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn new_sid(&self) -> u64 {
        self.next_sid.fetch_add(1, Ordering::Relaxed) + 1
    }

    // 既存の接続は置き換えてonKick
    pub fn bind(&self, uid: Uid, sid: u64, tx: mpsc::Sender<Outbound>) {
        let mut inner = self.lock();
        let pending = inner.pending.remove(&uid).unwrap_or_default();
        for f in pending {
            tx.send(Outbound::Frame(f)).ok();
        }
        if let Some(old) = inner.sessions.insert(uid, Session { sid, tx }) {
            if old.sid != sid {
                old.tx
                    .send(Outbound::Kick("logged in from another session".to_string()))
                    .ok();
                info!("{}: session {} displaced by {}", uid, old.sid, sid);
            }
        }
        info!("{}: bound to session {}", uid, sid);
    }

    // 置き換え済みの古い接続からは何もしない
    pub fn unbind(&self, uid: Uid, sid: u64) -> bool {
        let mut inner = self.lock();
        match inner.sessions.get(&uid) {
            Some(s) if s.sid == sid => {
                inner.sessions.remove(&uid);
                info!("{}: session {} dropped", uid, sid);
                true
            }
            _ => false,
        }
    }

    pub fn is_online(&self, uid: Uid) -> bool {
        self.lock().sessions.contains_key(&uid)
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // 切断中のプレイヤー宛てはonGameEndのみ保持して次の接続時に送る
    pub fn send(&self, uid: Uid, frame: &ServerFrame) {
        let mut inner = self.lock();
        match inner.sessions.get(&uid) {
            Some(s) => {
                if s.tx.send(Outbound::Frame(frame.clone())).is_err() {
                    debug!("{}: session {} already closed", uid, s.sid);
                }
            }
            None => {
                if frame.is_push(push::GAME_END) {
                    inner.pending.entry(uid).or_default().push(frame.clone());
                }
            }
        }
    }

    pub fn kick_all(&self, reason: &str) {
        let inner = self.lock();
        for s in inner.sessions.values() {
            s.tx.send(Outbound::Kick(reason.to_string())).ok();
        }
    }
}

#[test]
fn test_session_registry() {
    let reg = SessionRegistry::new();
    let (tx1, rx1) = mpsc::channel();
    let (tx2, rx2) = mpsc::channel();
    let s1 = reg.new_sid();
    let s2 = reg.new_sid();
    assert_ne!(s1, s2);

    reg.bind(10, s1, tx1);
    assert!(reg.is_online(10));
    let f = ServerFrame::push(push::BROADCAST, &BroadcastPush { message: "hi".into() });
    reg.send(10, &f);
    assert_eq!(rx1.try_recv(), Ok(Outbound::Frame(f.clone())));

    // 再ログインで古い接続はkick
    reg.bind(10, s2, tx2);
    assert!(matches!(rx1.try_recv(), Ok(Outbound::Kick(_))));
    assert!(!reg.unbind(10, s1));
    assert!(reg.is_online(10));
    assert!(reg.unbind(10, s2));
    assert!(!reg.is_online(10));

    // 切断中は卓の結果のみ保持
    reg.send(10, &f);
    let end = ServerFrame::push(push::GAME_END, &serde_json::json!({"deskNo": "000001"}));
    reg.send(10, &end);
    let (tx3, rx3) = mpsc::channel();
    reg.bind(10, reg.new_sid(), tx3);
    assert_eq!(rx3.try_recv(), Ok(Outbound::Frame(end)));
    assert!(rx3.try_recv().is_err());
    assert!(rx2.try_recv().is_err());
}
