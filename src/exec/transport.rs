// src/exec/transport.rs

//! Execution transport abstraction and the session handle passed to steps.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use crate::errors::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// How commands reach the execution environment.
///
/// Production code uses [`super::DockerTransport`]; tests provide fakes that
/// record sent commands and exec calls.
pub trait ExecTransport: Send + Sync {
    /// Send command lines to a shell in the environment. Output lines arrive
    /// on the session's receiver unless `detach` is set.
    fn send(&self, detach: bool, lines: Vec<String>) -> BoxFuture<'_, Result<()>>;

    /// Run one command in `target` and capture its output.
    fn exec_one<'a>(&'a self, target: &'a str, argv: Vec<String>) -> BoxFuture<'a, Result<String>>;

    /// Identifier of the environment (container id) commands run in.
    fn target_id(&self) -> &str;

    /// Resolves once the most recently sent foreground command has finished.
    fn wait_finished(&self) -> BoxFuture<'_, ()>;
}

/// Where forwarded output lines end up.
pub trait LineSink: Send + Sync {
    fn emit(&self, line: &str, hidden: bool);
}

/// Prints forwarded lines on stdout (logs go to stderr).
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn emit(&self, line: &str, hidden: bool) {
        if !hidden {
            println!("{line}");
        }
    }
}

/// Channel/handle pair a step talks to the environment through.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn ExecTransport>,
    recv: Arc<Mutex<mpsc::Receiver<String>>>,
    logs_hidden: bool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.transport.target_id())
            .field("logs_hidden", &self.logs_hidden)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(transport: Arc<dyn ExecTransport>, recv: mpsc::Receiver<String>) -> Self {
        Self {
            transport,
            recv: Arc::new(Mutex::new(recv)),
            logs_hidden: false,
        }
    }

    pub fn with_logs_hidden(mut self, hidden: bool) -> Self {
        self.logs_hidden = hidden;
        self
    }

    pub fn transport(&self) -> &Arc<dyn ExecTransport> {
        &self.transport
    }

    pub fn logs_hidden(&self) -> bool {
        self.logs_hidden
    }

    pub(crate) fn output(&self) -> Arc<Mutex<mpsc::Receiver<String>>> {
        Arc::clone(&self.recv)
    }

    pub async fn send(&self, detach: bool, lines: Vec<String>) -> Result<()> {
        self.transport.send(detach, lines).await
    }
}
