use std::sync::mpsc;
use std::thread;

use super::misc::{sleep_ms, Res};
use crate::{debug, error, warn};

// DB書き込みなど結果を待つ必要のない副作用を別スレッドで実行する
// 失敗した場合は数回リトライしてログに残すのみ (ゲーム進行は止めない)
type Job = Box<dyn FnMut() -> Res + Send>;

const RETRY: usize = 3;

#[derive(Clone)]
pub struct Jobs {
    sender: Option<mpsc::Sender<(String, Job)>>, // Noneの場合は呼び出し元で即時実行
}

impl Jobs {
    pub fn start() -> Self {
        let (tx, rx) = mpsc::channel::<(String, Job)>();
        thread::spawn(move || {
            for (name, mut job) in rx {
                run_job(&name, &mut job, true);
            }
            debug!("job runner stopped");
        });
        Self { sender: Some(tx) }
    }

    // テスト用: 非同期にせずその場で実行
    pub fn inline() -> Self {
        Self { sender: None }
    }

    pub fn push<F>(&self, name: &str, job: F)
    where
        F: FnMut() -> Res + Send + 'static,
    {
        let mut job: Job = Box::new(job);
        match &self.sender {
            Some(tx) => {
                if let Err(mpsc::SendError((name, mut job))) = tx.send((name.to_string(), job)) {
                    warn!("job runner is down. run '{}' inline", name);
                    run_job(&name, &mut job, false);
                }
            }
            None => run_job(name, &mut job, false),
        }
    }
}

fn run_job(name: &str, job: &mut Job, backoff: bool) {
    for n in 0..RETRY {
        match job() {
            Ok(()) => return,
            Err(e) => {
                warn!("job '{}' failed ({}/{}): {}", name, n + 1, RETRY, e);
                if backoff {
                    sleep_ms(100 << n);
                }
            }
        }
    }
    error!("job '{}' dropped after {} attempts", name, RETRY);
}

#[test]
fn test_inline_retry() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let count = Arc::new(AtomicUsize::new(0));
    let c = count.clone();
    Jobs::inline().push("flaky", move || {
        if c.fetch_add(1, Ordering::SeqCst) < 1 {
            Err("first attempt fails".into())
        } else {
            Ok(())
        }
    });
    assert_eq!(count.load(Ordering::SeqCst), 2);
}
