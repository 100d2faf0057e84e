use std::sync::{Arc, Mutex};

use super::Listener;
use crate::model::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Frame(Uid, ServerFrame),
    Seat(Uid, Option<DeskNo>),
    Closed(DeskNo),
}

// 卓の出力をすべて記録する (テスト, 検証用)
// 記録はcloneしたレコーダー間で共有される
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    records: Arc<Mutex<Vec<Recorded>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Recorded> {
        match self.records.lock() {
            Ok(mut r) => std::mem::take(&mut *r),
            Err(_) => vec![],
        }
    }

    pub fn all(&self) -> Vec<Recorded> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    // uid宛てのフレーム
    pub fn frames_to(&self, uid: Uid) -> Vec<ServerFrame> {
        self.all()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Frame(u, f) if u == uid => Some(f),
                _ => None,
            })
            .collect()
    }

    // uid宛ての指定プッシュ
    pub fn pushes_to(&self, uid: Uid, name: &str) -> Vec<ServerFrame> {
        self.frames_to(uid)
            .into_iter()
            .filter(|f| f.is_push(name))
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut r) = self.records.lock() {
            r.clear();
        }
    }

    fn record(&self, r: Recorded) {
        if let Ok(mut rs) = self.records.lock() {
            rs.push(r);
        }
    }
}

impl Listener for EventRecorder {
    fn notify(&mut self, uid: Uid, frame: &ServerFrame) {
        self.record(Recorded::Frame(uid, frame.clone()));
    }

    fn seat_changed(&mut self, uid: Uid, desk_no: Option<&str>) {
        self.record(Recorded::Seat(uid, desk_no.map(|s| s.to_string())));
    }

    fn desk_closed(&mut self, desk_no: &str) {
        self.record(Recorded::Closed(desk_no.to_string()));
    }
}
