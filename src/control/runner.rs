use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use super::desk::{Desk, DeskMessage};
use crate::error::{ErrorCode, GameResult};
use crate::{debug, error};

// 卓スレッドへの送信口
#[derive(Debug, Clone)]
pub struct DeskHandle {
    desk_no: String,
    tx: mpsc::Sender<DeskMessage>,
}

impl DeskHandle {
    pub fn new(desk_no: &str, tx: mpsc::Sender<DeskMessage>) -> Self {
        Self {
            desk_no: desk_no.to_string(),
            tx,
        }
    }

    pub fn desk_no(&self) -> &str {
        &self.desk_no
    }

    // スレッドが終了していればDeskNotFound
    pub fn send(&self, msg: DeskMessage) -> GameResult {
        self.tx.send(msg).map_err(|_| ErrorCode::DeskNotFound)
    }
}

// 1卓につき1スレッド. 卓の状態はこのスレッドのみが変更する
pub fn spawn_desk(desk: Desk) -> DeskHandle {
    let (tx, rx) = mpsc::channel();
    let handle = DeskHandle::new(desk.desk_no(), tx);
    thread::spawn(move || run(desk, rx));
    handle
}

fn run(mut desk: Desk, rx: mpsc::Receiver<DeskMessage>) {
    while !desk.is_closed() {
        // 次の応答期限まで待機. 期限がなければメッセージが届くまで
        let msg = match desk.next_deadline() {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(timeout) {
                    Ok(m) => Some(m),
                    Err(mpsc::RecvTimeoutError::Timeout) => None,
                    Err(mpsc::RecvTimeoutError::Disconnected) => Some(DeskMessage::Die),
                }
            }
            None => Some(rx.recv().unwrap_or(DeskMessage::Die)),
        };

        let now = Instant::now();
        let res = panic::catch_unwind(AssertUnwindSafe(|| match msg {
            Some(m) => desk.handle(m, now),
            None => desk.tick(now),
        }));
        if res.is_err() {
            error!("[{}] desk panicked. destroy", desk.desk_no());
            let _ = panic::catch_unwind(AssertUnwindSafe(|| desk.destroy("internal error")));
            break;
        }
    }
    debug!("[{}] desk thread exit", desk.desk_no());
}
