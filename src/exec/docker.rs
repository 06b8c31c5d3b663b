// src/exec/docker.rs

//! `docker exec`-based transport.
//!
//! Each foreground `send` starts a fresh `docker exec -i <id> /bin/sh`, writes
//! the command lines to its stdin and closes it, so the shell exits once the
//! command does (or once it is killed). stdout and stderr lines are forwarded
//! to the session channel.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use crate::errors::{Result, WatchStepError};

use super::transport::{BoxFuture, ExecTransport};

/// Capacity of the output line channel handed to the session.
const OUTPUT_BUFFER: usize = 1024;

pub struct DockerTransport {
    docker_bin: String,
    container_id: String,
    output_tx: mpsc::Sender<String>,
    /// Sequence number of the most recent foreground shell.
    latest: Arc<AtomicU64>,
    finished: Arc<Notify>,
}

impl std::fmt::Debug for DockerTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerTransport")
            .field("container_id", &self.container_id)
            .finish_non_exhaustive()
    }
}

impl DockerTransport {
    /// Create a transport for `container_id` plus the receiver for its output.
    pub fn new(container_id: impl Into<String>) -> (Self, mpsc::Receiver<String>) {
        let (output_tx, output_rx) = mpsc::channel(OUTPUT_BUFFER);
        let transport = Self {
            docker_bin: "docker".to_string(),
            container_id: container_id.into(),
            output_tx,
            latest: Arc::new(AtomicU64::new(0)),
            finished: Arc::new(Notify::new()),
        };
        (transport, output_rx)
    }

    /// Use a different docker CLI binary (e.g. `podman`).
    pub fn with_docker_bin(mut self, bin: impl Into<String>) -> Self {
        self.docker_bin = bin.into();
        self
    }

    async fn send_detached(&self, script: String) -> anyhow::Result<()> {
        let status = Command::new(&self.docker_bin)
            .args(["exec", "-d", self.container_id.as_str(), "/bin/sh", "-c", script.as_str()])
            .stdin(Stdio::null())
            .status()
            .await
            .context("spawning docker exec -d")?;
        anyhow::ensure!(status.success(), "docker exec -d exited with {status}");
        Ok(())
    }

    async fn send_foreground(&self, script: String) -> anyhow::Result<()> {
        let mut child = Command::new(&self.docker_bin)
            .args(["exec", "-i", self.container_id.as_str(), "/bin/sh"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("spawning docker exec -i")?;

        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, self.output_tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, self.output_tx.clone());
        }

        let mut stdin = child.stdin.take().context("docker exec stdin not piped")?;
        stdin
            .write_all(script.as_bytes())
            .await
            .context("writing command to shell")?;
        // Closing stdin lets the shell exit after the last line.
        drop(stdin);

        let latest = Arc::clone(&self.latest);
        let finished = Arc::clone(&self.finished);
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(seq, %status, "shell exited"),
                Err(e) => warn!(seq, error = %e, "waiting for shell failed"),
            }
            if latest.load(Ordering::SeqCst) == seq {
                finished.notify_one();
            }
        });

        Ok(())
    }
}

fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).await.is_err() {
                break;
            }
        }
    });
}

impl ExecTransport for DockerTransport {
    fn send(&self, detach: bool, lines: Vec<String>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let mut script = lines.join("\n");
            script.push('\n');

            let res = if detach {
                self.send_detached(script).await
            } else {
                self.send_foreground(script).await
            };
            res.map_err(|e| WatchStepError::Transport(format!("{e:#}")))
        })
    }

    fn exec_one<'a>(&'a self, target: &'a str, argv: Vec<String>) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let output = Command::new(&self.docker_bin)
                .arg("exec")
                .arg(target)
                .args(&argv)
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| WatchStepError::Transport(format!("spawning docker exec: {e}")))?;

            if !output.status.success() {
                return Err(WatchStepError::Transport(format!(
                    "docker exec exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                )));
            }
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }

    fn target_id(&self) -> &str {
        &self.container_id
    }

    fn wait_finished(&self) -> BoxFuture<'_, ()> {
        let finished = Arc::clone(&self.finished);
        Box::pin(async move { finished.notified().await })
    }
}
