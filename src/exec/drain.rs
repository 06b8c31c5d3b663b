// src/exec/drain.rs

//! Forwards session output to a [`LineSink`] for the lifetime of a step.

use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use super::transport::{LineSink, Session};

/// Stops the drain task when dropped.
#[derive(Debug)]
pub struct OutputDrain {
    stop: Option<oneshot::Sender<()>>,
}

impl OutputDrain {
    /// Spawn the drain task. The session receiver stays locked by the task
    /// until the drain is stopped.
    pub fn spawn(session: &Session, sink: Arc<dyn LineSink>) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let recv = session.output();
        let hidden = session.logs_hidden();

        tokio::spawn(async move {
            let mut rx = recv.lock().await;
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    line = rx.recv() => match line {
                        Some(line) => sink.emit(&line, hidden),
                        None => break,
                    },
                }
            }
            debug!("output drain stopped");
        });

        Self { stop: Some(stop_tx) }
    }
}

impl Drop for OutputDrain {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
