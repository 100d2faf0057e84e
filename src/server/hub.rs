use std::sync::Arc;

use super::session::SessionRegistry;
use crate::control::DeskRegistry;
use crate::listener::Listener;
use crate::model::*;

// 卓の出力を接続と登録簿に反映する
#[derive(Debug, Clone)]
pub struct Hub {
    sessions: Arc<SessionRegistry>,
    desks: Arc<DeskRegistry>,
}

impl Hub {
    pub fn new(sessions: Arc<SessionRegistry>, desks: Arc<DeskRegistry>) -> Self {
        Self { sessions, desks }
    }
}

impl Listener for Hub {
    fn notify(&mut self, uid: Uid, frame: &ServerFrame) {
        self.sessions.send(uid, frame);
    }

    fn seat_changed(&mut self, uid: Uid, desk_no: Option<&str>) {
        self.desks.set_seat(uid, desk_no);
    }

    fn desk_closed(&mut self, desk_no: &str) {
        self.desks.remove(desk_no);
    }
}
