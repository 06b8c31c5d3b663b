use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use watchstep::errors::{Result, WatchStepError};
use watchstep::exec::{BoxFuture, ExecTransport, Session};

/// A fake transport that:
/// - records every `send` and `exec_one` call
/// - can be told to fail kills or sends, or to delay sends
/// - lets the test decide when the command "finishes".
pub struct FakeTransport {
    target: String,
    sent: Mutex<Vec<Vec<String>>>,
    execs: Mutex<Vec<(String, Vec<String>)>>,
    fail_execs: AtomicBool,
    fail_sends: AtomicBool,
    send_delay: Mutex<Duration>,
    finished: Notify,
    output_tx: mpsc::Sender<String>,
}

impl FakeTransport {
    pub fn new(target: &str) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (output_tx, output_rx) = mpsc::channel(64);
        let transport = Arc::new(Self {
            target: target.to_string(),
            sent: Mutex::new(Vec::new()),
            execs: Mutex::new(Vec::new()),
            fail_execs: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            send_delay: Mutex::new(Duration::ZERO),
            finished: Notify::new(),
            output_tx,
        });
        (transport, output_rx)
    }

    /// Transport plus a session wired to it.
    pub fn session(target: &str) -> (Arc<Self>, Session) {
        let (transport, rx) = Self::new(target);
        let session = Session::new(transport.clone(), rx);
        (transport, session)
    }

    pub fn sent(&self) -> Vec<Vec<String>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Every `exec_one` in this crate is a kill-all.
    pub fn kill_count(&self) -> usize {
        self.execs.lock().unwrap().len()
    }

    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        self.execs.lock().unwrap().clone()
    }

    pub fn fail_execs(&self, fail: bool) {
        self.fail_execs.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn delay_sends(&self, delay: Duration) {
        *self.send_delay.lock().unwrap() = delay;
    }

    /// Report the last sent command as finished.
    pub fn finish(&self) {
        self.finished.notify_one();
    }

    /// Push a line as if the command printed it.
    pub async fn emit_line(&self, line: &str) {
        let _ = self.output_tx.send(line.to_string()).await;
    }
}

impl ExecTransport for FakeTransport {
    fn send(&self, _detach: bool, lines: Vec<String>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(WatchStepError::Transport("connection reset".into()));
            }
            self.sent.lock().unwrap().push(lines);
            let delay = *self.send_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(())
        })
    }

    fn exec_one<'a>(&'a self, target: &'a str, argv: Vec<String>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.execs
                .lock()
                .unwrap()
                .push((target.to_string(), argv));
            if self.fail_execs.load(Ordering::SeqCst) {
                return Err(WatchStepError::Transport("no such container".into()));
            }
            Ok(String::new())
        })
    }

    fn target_id(&self) -> &str {
        &self.target
    }

    fn wait_finished(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.finished.notified())
    }
}
