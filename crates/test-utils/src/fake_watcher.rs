use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use watchstep::errors::{Result, WatchStepError};
use watchstep::types::ChangeKind;
use watchstep::watch::{ChangeEvent, NotificationSource, WatchMessage, WatcherFactory};

#[derive(Debug, Default)]
struct Shared {
    registered: Mutex<Vec<PathBuf>>,
    tx: Mutex<Option<mpsc::UnboundedSender<WatchMessage>>>,
}

/// Fake notification source factory.
///
/// Like a kernel watch, a change is only delivered when the changed path's
/// parent directory was registered.
#[derive(Debug, Default)]
pub struct FakeWatcherFactory {
    shared: Arc<Shared>,
    created: AtomicUsize,
    fail_create: AtomicBool,
}

impl FakeWatcherFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn registered(&self) -> Vec<PathBuf> {
        self.shared.registered.lock().unwrap().clone()
    }

    /// Whether the loop is up (a source has been created and is listening).
    pub fn is_live(&self) -> bool {
        self.shared
            .tx
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver a change. Returns whether the path was observable.
    pub fn change(&self, path: impl AsRef<Path>, kind: ChangeKind) -> bool {
        let path = path.as_ref();
        let watched = path
            .parent()
            .is_some_and(|p| self.shared.registered.lock().unwrap().iter().any(|r| r == p));
        if !watched {
            return false;
        }
        self.send(WatchMessage::Change(ChangeEvent {
            path: path.to_path_buf(),
            kind,
        }))
    }

    pub fn error(&self, msg: &str) -> bool {
        self.send(WatchMessage::Error(msg.to_string()))
    }

    fn send(&self, msg: WatchMessage) -> bool {
        match self.shared.tx.lock().unwrap().as_ref() {
            Some(tx) => tx.send(msg).is_ok(),
            None => false,
        }
    }
}

struct FakeSource {
    shared: Arc<Shared>,
}

impl NotificationSource for FakeSource {
    fn add_dir(&mut self, dir: &Path) -> Result<()> {
        self.shared.registered.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }
}

impl WatcherFactory for FakeWatcherFactory {
    fn create(
        &self,
    ) -> Result<(Box<dyn NotificationSource>, mpsc::UnboundedReceiver<WatchMessage>)> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(WatchStepError::WatchSetup("too many open files".into()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *self.shared.tx.lock().unwrap() = Some(tx);
        Ok((
            Box::new(FakeSource {
                shared: Arc::clone(&self.shared),
            }),
            rx,
        ))
    }
}
