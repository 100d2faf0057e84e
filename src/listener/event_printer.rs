use super::Listener;
use crate::debug;
use crate::model::*;

// 卓の出力をログに流す (-v指定時のみ表示)
#[derive(Debug)]
pub struct EventPrinter {
    desk_no: DeskNo,
}

impl EventPrinter {
    pub fn new(desk_no: &str) -> Self {
        Self {
            desk_no: desk_no.to_string(),
        }
    }
}

impl Listener for EventPrinter {
    fn notify(&mut self, uid: Uid, frame: &ServerFrame) {
        match frame {
            ServerFrame::Push { route, data } => {
                debug!("[{}] -> {} {} {}", self.desk_no, uid, route, data);
            }
            ServerFrame::Response {
                route, code, error, ..
            } => {
                if *code == 0 {
                    debug!("[{}] -> {} {} ok", self.desk_no, uid, route);
                } else {
                    debug!("[{}] -> {} {} {}({})", self.desk_no, uid, route, error, code);
                }
            }
        }
    }

    fn seat_changed(&mut self, uid: Uid, desk_no: Option<&str>) {
        debug!("[{}] seat of {}: {:?}", self.desk_no, uid, desk_no);
    }

    fn desk_closed(&mut self, desk_no: &str) {
        debug!("[{}] closed", desk_no);
    }
}
