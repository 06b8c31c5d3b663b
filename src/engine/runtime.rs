// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::exec::{exposed_port_maps, kill_all, PortMap, Session};
use crate::watch::{Debouncer, WatchMessage};

use super::core::{CoreCommand, CoreRuntime};
use super::{KillPurpose, LoopEvent, KILL_SIGNAL};

/// Inputs for reporting forwarded ports after a restart.
#[derive(Debug, Clone, Default)]
pub struct PortSettings {
    pub docker_host: String,
    pub published: Vec<String>,
}

/// What happened to one fire-and-forget restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    /// Command sent and this was still the latest cycle; ports reported.
    Started { generation: u64, ports: Vec<PortMap> },
    /// Command sent but a newer cycle began meanwhile; no port report.
    Superseded { generation: u64 },
    /// Command sent but the docker host could not be parsed.
    PortsUnavailable { generation: u64 },
    /// Sending the command failed; this cycle is abandoned.
    SendFailed { generation: u64 },
}

/// Summary returned when the loop stops.
#[derive(Debug)]
pub struct LoopReport {
    pub exit_code: i32,
    /// Kill-all invocations, reload and shutdown alike.
    pub kills: usize,
    /// The latest restart plus any older ones that were still running when
    /// it was spawned, oldest first. Dropping them detaches the tasks.
    pub restarts: Vec<JoinHandle<RestartOutcome>>,
}

/// Async IO shell around [`CoreRuntime`].
///
/// Owns the watcher receiver, the debouncer and the finish receiver. Its
/// `select!` loop is the single consumer of all of them.
pub struct Runtime {
    core: CoreRuntime,
    watch_rx: mpsc::UnboundedReceiver<WatchMessage>,
    finished_rx: mpsc::Receiver<()>,
    debouncer: Debouncer,
    session: Session,
    code: String,
    ports: PortSettings,
    latest: Arc<AtomicU64>,
    kills: usize,
    restarts: Vec<JoinHandle<RestartOutcome>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("kills", &self.kills)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        core: CoreRuntime,
        watch_rx: mpsc::UnboundedReceiver<WatchMessage>,
        finished_rx: mpsc::Receiver<()>,
        debouncer: Debouncer,
        session: Session,
        code: impl Into<String>,
        ports: PortSettings,
    ) -> Self {
        Self {
            core,
            watch_rx,
            finished_rx,
            debouncer,
            session,
            code: code.into(),
            ports,
            latest: Arc::new(AtomicU64::new(0)),
            kills: 0,
            restarts: Vec::new(),
        }
    }

    /// Main event loop. Returns once the core reaches `Stopped`.
    pub async fn run(mut self) -> LoopReport {
        info!("reloading on file changes");

        let start = self.core.start();
        let mut keep_running = self.execute(start.commands).await;

        while keep_running {
            let event = tokio::select! {
                msg = self.watch_rx.recv() => match msg {
                    Some(WatchMessage::Change(change)) => {
                        debug!(?change, "notify event");
                        LoopEvent::Changed(change)
                    }
                    Some(WatchMessage::Error(err)) => LoopEvent::WatcherFailed(err),
                    None => LoopEvent::WatcherFailed("notification source closed".to_string()),
                },
                Some(()) = self.debouncer.fired() => LoopEvent::DebounceFired,
                Some(()) = self.finished_rx.recv() => LoopEvent::Finished,
            };

            let step = self.core.step(event);
            let more = self.execute(step.commands).await;
            keep_running = step.keep_running && more;
        }

        info!(exit_code = self.core.exit_code(), "reload loop stopped");
        LoopReport {
            exit_code: self.core.exit_code(),
            kills: self.kills,
            restarts: self.restarts,
        }
    }

    /// Execute commands from the core. Reload kills feed their result back
    /// into the core before anything else happens.
    async fn execute(&mut self, commands: Vec<CoreCommand>) -> bool {
        let mut queue: VecDeque<CoreCommand> = commands.into();
        let mut keep_running = true;

        while let Some(command) = queue.pop_front() {
            match command {
                CoreCommand::ArmDebounce => self.debouncer.trigger(),
                CoreCommand::KillProcesses { purpose } => {
                    let ok = self.kill(purpose).await;
                    if purpose == KillPurpose::Reload {
                        let step = self.core.step(LoopEvent::KillFinished { ok });
                        keep_running &= step.keep_running;
                        queue.extend(step.commands);
                    }
                }
                CoreCommand::Restart { generation } => self.spawn_restart(generation),
            }
        }

        keep_running
    }

    async fn kill(&mut self, purpose: KillPurpose) -> bool {
        self.kills += 1;
        let transport = self.session.transport();
        match kill_all(transport.as_ref(), transport.target_id(), KILL_SIGNAL).await {
            Ok(()) => true,
            Err(err) => {
                match purpose {
                    KillPurpose::Reload => warn!(error = %err, "kill before reload failed"),
                    // Shutdown kills are best effort.
                    KillPurpose::Shutdown => debug!(error = %err, "kill on shutdown failed"),
                }
                false
            }
        }
    }

    fn spawn_restart(&mut self, generation: u64) {
        self.latest.store(generation, Ordering::SeqCst);

        let session = self.session.clone();
        let code = self.code.clone();
        let ports = self.ports.clone();
        let latest = Arc::clone(&self.latest);

        // Finished restarts have nothing left to report.
        self.restarts.retain(|h| !h.is_finished());

        // Not awaited: the loop keeps serving events while the command runs.
        self.restarts.push(tokio::spawn(async move {
            restart(session, code, generation, latest, ports).await
        }));
    }
}

async fn restart(
    session: Session,
    code: String,
    generation: u64,
    latest: Arc<AtomicU64>,
    ports: PortSettings,
) -> RestartOutcome {
    if let Err(err) = session.send(false, vec!["set +e".to_string(), code]).await {
        error!(generation, error = %err, "sending command failed");
        return RestartOutcome::SendFailed { generation };
    }

    if latest.load(Ordering::SeqCst) != generation {
        debug!(generation, "restart superseded; not reporting ports");
        return RestartOutcome::Superseded { generation };
    }

    match exposed_port_maps(&ports.docker_host, &ports.published) {
        Ok(maps) => {
            for map in &maps {
                info!(
                    "Forwarding {} to {} on the container.",
                    map.host_uri, map.container_port
                );
            }
            RestartOutcome::Started {
                generation,
                ports: maps,
            }
        }
        Err(err) => {
            warn!(error = %err, "there was a problem parsing your docker host");
            RestartOutcome::PortsUnavailable { generation }
        }
    }
}
