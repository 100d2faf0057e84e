mod event_printer;
mod event_recorder;

use std::fmt;

use crate::model::*;

pub use event_printer::EventPrinter;
pub use event_recorder::{EventRecorder, Recorded};

// 卓からの出力先
// notify: プレイヤー宛てのフレーム (プッシュ, レスポンス)
// seat_changed, desk_closed: 卓とプレイヤーの対応の変化 (登録簿の更新用)
pub trait Listener: Send {
    fn notify(&mut self, uid: Uid, frame: &ServerFrame);
    fn seat_changed(&mut self, _uid: Uid, _desk_no: Option<&str>) {}
    fn desk_closed(&mut self, _desk_no: &str) {}
}

impl fmt::Debug for dyn Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Listener")
    }
}
