// src/engine/core.rs

//! Pure core of the reload loop.
//!
//! Consumes [`LoopEvent`]s and returns the commands the IO shell should run.
//! No Tokio types, channels or processes in here, so every transition can be
//! unit tested directly.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::errors::WatchStepError;
use crate::types::KillFailurePolicy;
use crate::watch::{ChangeEvent, ExclusionFilter};

use super::{KillPurpose, LoopEvent, LoopState};

/// Command produced by the core, executed by the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Arm (or re-arm) the debouncer.
    ArmDebounce,
    /// Signal every process in the environment except PID 1.
    KillProcesses { purpose: KillPurpose },
    /// Re-send the command as reload cycle `generation`.
    Restart { generation: u64 },
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    pub keep_running: bool,
}

impl CoreStep {
    fn run(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    fn stop(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: false,
        }
    }
}

#[derive(Debug)]
pub struct CoreRuntime {
    filter: Arc<ExclusionFilter>,
    policy: KillFailurePolicy,
    state: LoopState,
    /// Last reload cycle handed out. Strictly increasing.
    generation: u64,
    exit_code: i32,
}

impl CoreRuntime {
    pub fn new(filter: Arc<ExclusionFilter>, policy: KillFailurePolicy) -> Self {
        Self {
            filter,
            policy,
            state: LoopState::Watching,
            generation: 0,
            exit_code: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 0 for a normal stop, 1 after a watcher failure or an aborting kill
    /// failure.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// The first build is unconditional.
    pub fn start(&mut self) -> CoreStep {
        CoreStep::run(vec![CoreCommand::ArmDebounce])
    }

    pub fn step(&mut self, event: LoopEvent) -> CoreStep {
        if self.state == LoopState::Stopped {
            debug!(?event, "event after stop ignored");
            return CoreStep::stop(Vec::new());
        }

        match event {
            LoopEvent::Changed(change) => {
                if self.qualifies(&change) {
                    debug!(path = ?change.path, "modified file");
                    CoreStep::run(vec![CoreCommand::ArmDebounce])
                } else {
                    CoreStep::run(Vec::new())
                }
            }
            LoopEvent::DebounceFired => CoreStep::run(vec![CoreCommand::KillProcesses {
                purpose: KillPurpose::Reload,
            }]),
            LoopEvent::KillFinished { ok } => self.after_reload_kill(ok),
            LoopEvent::WatcherFailed(msg) => {
                let err = WatchStepError::WatcherRuntime(msg);
                error!(error = %err, "stopping reload loop");
                self.stop_with(1);
                CoreStep::stop(Vec::new())
            }
            LoopEvent::Finished => {
                info!("finishing step");
                self.stop_with(0);
                CoreStep::stop(vec![CoreCommand::KillProcesses {
                    purpose: KillPurpose::Shutdown,
                }])
            }
        }
    }

    fn after_reload_kill(&mut self, ok: bool) -> CoreStep {
        if !ok {
            match self.policy {
                KillFailurePolicy::Abort => {
                    error!("killing previous processes failed; aborting reload loop");
                    self.stop_with(1);
                    return CoreStep::stop(Vec::new());
                }
                KillFailurePolicy::Continue => {
                    warn!("killing previous processes failed; restarting anyway");
                }
            }
        }

        self.generation += 1;
        info!(generation = self.generation, "reloading");
        CoreStep::run(vec![CoreCommand::Restart {
            generation: self.generation,
        }])
    }

    /// Write/create/remove, not a dotfile, not excluded.
    fn qualifies(&self, change: &ChangeEvent) -> bool {
        if !change.kind.triggers_reload() {
            return false;
        }
        let dotfile = change
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if dotfile {
            return false;
        }
        !self.filter.excludes_file(&change.path)
    }

    fn stop_with(&mut self, code: i32) {
        self.state = LoopState::Stopped;
        self.exit_code = code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChangeKind;
    use crate::watch::Pattern;
    use std::path::PathBuf;

    fn core(policy: KillFailurePolicy) -> CoreRuntime {
        let filter = ExclusionFilter::new(vec![
            Pattern::base_name(".*"),
            Pattern::base_name("_*"),
            Pattern::full_path("/p/*.log"),
        ]);
        CoreRuntime::new(Arc::new(filter), policy)
    }

    fn change(path: &str, kind: ChangeKind) -> LoopEvent {
        LoopEvent::Changed(ChangeEvent {
            path: PathBuf::from(path),
            kind,
        })
    }

    #[test]
    fn start_arms_debounce() {
        let mut c = core(KillFailurePolicy::Continue);
        assert_eq!(c.start().commands, vec![CoreCommand::ArmDebounce]);
    }

    #[test]
    fn qualifying_changes_only_arm_debounce() {
        let mut c = core(KillFailurePolicy::Continue);

        let step = c.step(change("/p/main.py", ChangeKind::Write));
        assert_eq!(step.commands, vec![CoreCommand::ArmDebounce]);
        assert!(step.keep_running);

        for ev in [
            change("/p/.main.py.swp", ChangeKind::Write),
            change("/p/main.py", ChangeKind::Chmod),
            change("/p/main.py", ChangeKind::Rename),
            change("/p/app.log", ChangeKind::Create),
        ] {
            let step = c.step(ev);
            assert!(step.commands.is_empty());
            assert!(step.keep_running);
        }
        assert_eq!(c.generation(), 0);
    }

    #[test]
    fn underscore_files_still_trigger() {
        let mut c = core(KillFailurePolicy::Continue);
        let step = c.step(change("/p/__init__.py", ChangeKind::Write));
        assert_eq!(step.commands, vec![CoreCommand::ArmDebounce]);
    }

    #[test]
    fn fire_kills_then_restarts_with_new_generation() {
        let mut c = core(KillFailurePolicy::Continue);

        let step = c.step(LoopEvent::DebounceFired);
        assert_eq!(
            step.commands,
            vec![CoreCommand::KillProcesses {
                purpose: KillPurpose::Reload
            }]
        );

        let step = c.step(LoopEvent::KillFinished { ok: true });
        assert_eq!(step.commands, vec![CoreCommand::Restart { generation: 1 }]);

        c.step(LoopEvent::DebounceFired);
        let step = c.step(LoopEvent::KillFinished { ok: true });
        assert_eq!(step.commands, vec![CoreCommand::Restart { generation: 2 }]);
    }

    #[test]
    fn kill_failure_continue_restarts() {
        let mut c = core(KillFailurePolicy::Continue);
        c.step(LoopEvent::DebounceFired);
        let step = c.step(LoopEvent::KillFinished { ok: false });
        assert_eq!(step.commands, vec![CoreCommand::Restart { generation: 1 }]);
        assert_eq!(c.state(), LoopState::Watching);
    }

    #[test]
    fn kill_failure_abort_stops_with_error() {
        let mut c = core(KillFailurePolicy::Abort);
        c.step(LoopEvent::DebounceFired);
        let step = c.step(LoopEvent::KillFinished { ok: false });
        assert!(step.commands.is_empty());
        assert!(!step.keep_running);
        assert_eq!(c.state(), LoopState::Stopped);
        assert_eq!(c.exit_code(), 1);
    }

    #[test]
    fn watcher_failure_is_terminal() {
        let mut c = core(KillFailurePolicy::Continue);
        let step = c.step(LoopEvent::WatcherFailed("overflow".into()));
        assert!(!step.keep_running);
        assert_eq!(c.exit_code(), 1);

        // Nothing happens after the stop.
        let step = c.step(LoopEvent::DebounceFired);
        assert!(step.commands.is_empty());
        assert!(!step.keep_running);
    }

    #[test]
    fn finish_kills_once_and_stops_cleanly() {
        let mut c = core(KillFailurePolicy::Continue);
        let step = c.step(LoopEvent::Finished);
        assert_eq!(
            step.commands,
            vec![CoreCommand::KillProcesses {
                purpose: KillPurpose::Shutdown
            }]
        );
        assert!(!step.keep_running);
        assert_eq!(c.exit_code(), 0);

        let step = c.step(LoopEvent::Finished);
        assert!(step.commands.is_empty());
    }
}
