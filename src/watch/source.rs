// src/watch/source.rs

//! Filesystem notification sources.
//!
//! The reload loop only sees a [`WatchMessage`] stream; the concrete source
//! behind it is either `notify`'s recommended watcher (production) or a fake
//! supplied by tests through [`WatcherFactory`].

use std::path::{Path, PathBuf};

use notify::event::{EventKind, ModifyKind};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::errors::{Result, WatchStepError};
use crate::types::ChangeKind;

/// A single change reported for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Everything a notification source can tell the reload loop.
#[derive(Debug, Clone)]
pub enum WatchMessage {
    Change(ChangeEvent),
    /// The source failed after setup (queue overflow, handle exhaustion...).
    Error(String),
}

/// A live notification source that directories can be registered with.
///
/// Registration is non-recursive: the tree builder decides which directories
/// are watched.
pub trait NotificationSource: Send {
    fn add_dir(&mut self, dir: &Path) -> Result<()>;
}

/// Creates notification sources. Called once per watching `execute`.
pub trait WatcherFactory: Send + Sync {
    fn create(
        &self,
    ) -> Result<(Box<dyn NotificationSource>, mpsc::UnboundedReceiver<WatchMessage>)>;
}

/// `notify`-backed source.
///
/// Dropping it releases every registered directory handle.
pub struct NotifySource {
    inner: RecommendedWatcher,
}

impl std::fmt::Debug for NotifySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySource").finish()
    }
}

impl NotifySource {
    pub fn new() -> Result<(Self, mpsc::UnboundedReceiver<WatchMessage>)> {
        let (tx, rx) = mpsc::unbounded_channel::<WatchMessage>();

        // Called synchronously by notify on its own thread.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                for msg in watch_messages(res) {
                    if tx.send(msg).is_err() {
                        // Receiver dropped: the reload loop has finished.
                        return;
                    }
                }
            },
            Config::default(),
        )
        .map_err(|e| WatchStepError::WatchSetup(format!("creating watcher: {e}")))?;

        Ok((Self { inner }, rx))
    }
}

impl NotificationSource for NotifySource {
    fn add_dir(&mut self, dir: &Path) -> Result<()> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchStepError::WatchSetup(format!("watching {}: {e}", dir.display())))
    }
}

/// Factory for [`NotifySource`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifyWatcherFactory;

impl WatcherFactory for NotifyWatcherFactory {
    fn create(
        &self,
    ) -> Result<(Box<dyn NotificationSource>, mpsc::UnboundedReceiver<WatchMessage>)> {
        let (source, rx) = NotifySource::new()?;
        Ok((Box::new(source), rx))
    }
}

/// Map a `notify` event kind onto the operations the loop cares about.
pub fn classify(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Create,
        EventKind::Remove(_) => ChangeKind::Remove,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            ChangeKind::Write
        }
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Rename,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeKind::Chmod,
        _ => ChangeKind::Other,
    }
}

/// Translate one `notify` callback result into loop messages.
///
/// A rescan request means the kernel queue overflowed and events were lost;
/// that is a watcher failure, not a change.
pub fn watch_messages(res: notify::Result<Event>) -> Vec<WatchMessage> {
    match res {
        Ok(event) if event.need_rescan() => {
            vec![WatchMessage::Error("event queue overflow".to_string())]
        }
        Ok(event) => change_events(&event)
            .into_iter()
            .map(WatchMessage::Change)
            .collect(),
        Err(err) => vec![WatchMessage::Error(err.to_string())],
    }
}

fn change_events(event: &Event) -> Vec<ChangeEvent> {
    let kind = classify(&event.kind);
    event
        .paths
        .iter()
        .map(|path| ChangeEvent {
            path: path.clone(),
            kind,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{
        AccessKind, CreateKind, DataChange, Flag, MetadataKind, RemoveKind, RenameMode,
    };

    #[test]
    fn classify_maps_content_operations() {
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), ChangeKind::Create);
        assert_eq!(classify(&EventKind::Remove(RemoveKind::Any)), ChangeKind::Remove);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Write
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            ChangeKind::Rename
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            ChangeKind::Chmod
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), ChangeKind::Other);
    }

    #[test]
    fn multi_path_events_fan_out() {
        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/p/a.rs"))
            .add_path(PathBuf::from("/p/b.rs"));
        let changes = change_events(&event);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Create));
    }

    #[test]
    fn queue_overflow_becomes_an_error() {
        let overflow = Event::new(EventKind::Other).set_flag(Flag::Rescan);
        let messages = watch_messages(Ok(overflow));
        assert_eq!(messages.len(), 1);
        assert!(matches!(&messages[0], WatchMessage::Error(msg) if msg.contains("overflow")));
    }

    #[test]
    fn plain_events_become_changes() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/p/main.py"));
        let messages = watch_messages(Ok(event));
        assert!(matches!(
            &messages[..],
            [WatchMessage::Change(ChangeEvent { kind: ChangeKind::Write, .. })]
        ));
    }

    #[test]
    fn backend_errors_become_errors() {
        let messages = watch_messages(Err(notify::Error::generic("inotify gone")));
        assert!(matches!(&messages[..], [WatchMessage::Error(_)]));
    }
}
