// src/step.rs

//! The watch step: runs the configured command once, or keeps it running
//! and restarts it whenever the project changes.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{ConfigFile, PipelineOptions};
use crate::engine::{CoreRuntime, PortSettings, Runtime, KILL_SIGNAL};
use crate::errors::{Result, WatchStepError};
use crate::exec::{kill_all, BoxFuture, LineSink, OutputDrain, Session, StdoutSink};
use crate::fs::{FileSystem, RealFileSystem};
use crate::signal::{Registration, SignalHandler, SignalRegistry};
use crate::watch::{
    build_watch_tree, Debouncer, ExclusionFilter, NotifyWatcherFactory, WatcherFactory,
};

/// Id of the interrupt handler registered while the step runs.
pub const STOP_HANDLER_ID: &str = "stop-watch";

/// An artifact collected from the environment. This step produces none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub container_path: String,
    pub host_path: PathBuf,
}

/// Interface the pipeline drives steps through.
pub trait Step: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn display_name(&self) -> &str;
    fn safe_id(&self) -> &str;

    /// Run the step; returns the step's exit code.
    fn execute<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, Result<i32>>;

    fn fetch(&self) -> Result<String>;
    fn collect_file(
        &self,
        container_path: &str,
        src: &str,
        name: &str,
        dst: &mut dyn Write,
    ) -> Result<()>;
    fn collect_artifact(&self, path: &str) -> Result<Option<Artifact>>;
    fn report_path(&self, parts: &[&str]) -> String;
    fn should_sync_env(&self) -> bool;
}

pub struct WatchStep {
    id: String,
    name: String,
    display_name: String,
    safe_id: String,
    code: String,
    reload: bool,
    options: PipelineOptions,
    registry: Arc<dyn SignalRegistry>,
    watchers: Arc<dyn WatcherFactory>,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn LineSink>,
}

impl std::fmt::Debug for WatchStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchStep")
            .field("display_name", &self.display_name)
            .field("safe_id", &self.safe_id)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}

impl WatchStep {
    pub fn new(cfg: &ConfigFile, registry: Arc<dyn SignalRegistry>) -> Self {
        let name = "watch".to_string();
        let display_name = cfg
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| name.clone());

        Self {
            id: name.clone(),
            // Random suffix keeps on-disk names from colliding.
            safe_id: format!("{name}-{}", Uuid::new_v4()),
            name,
            display_name,
            code: cfg.code.clone(),
            reload: cfg.reload,
            options: cfg.options.clone(),
            registry,
            watchers: Arc::new(NotifyWatcherFactory),
            fs: Arc::new(RealFileSystem),
            sink: Arc::new(StdoutSink),
        }
    }

    pub fn with_watcher_factory(mut self, watchers: Arc<dyn WatcherFactory>) -> Self {
        self.watchers = watchers;
        self
    }

    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LineSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn reload(&self) -> bool {
        self.reload
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The watch root, made absolute.
    pub fn watch_root(&self) -> Result<PathBuf> {
        self.fs
            .canonicalize(&self.options.project_path)
            .map_err(|e| WatchStepError::WatchSetup(format!("{e:#}")))
    }

    /// Exclusion filter for the current watch root.
    pub fn exclusion_filter(&self) -> Result<ExclusionFilter> {
        let root = self.watch_root()?;
        Ok(ExclusionFilter::load(
            self.fs.as_ref(),
            &root,
            &self.options.step_dirs,
            &self.options.ignore_file,
        ))
    }

    async fn run(&self, session: &Session) -> Result<i32> {
        // Forward container output for as long as the step runs.
        let _drain = OutputDrain::spawn(session, Arc::clone(&self.sink));

        let (finished_tx, finished_rx) = mpsc::channel::<()>(1);
        let handler = SignalHandler::new(STOP_HANDLER_ID, move || {
            info!("Keyboard interrupt detected, finishing step");
            let _ = finished_tx.try_send(());
            // Handled; no further handlers.
            false
        });
        let _registration = Registration::new(self.registry.as_ref(), handler);

        if self.reload {
            self.run_watching(session, finished_rx).await
        } else {
            self.run_once(session, finished_rx).await
        }
    }

    /// Send the command once and wait for it to finish or for an interrupt.
    async fn run_once(&self, session: &Session, mut finished_rx: mpsc::Receiver<()>) -> Result<i32> {
        session
            .send(false, vec!["set +e".to_string(), self.code.clone()])
            .await?;

        let transport = session.transport();
        tokio::select! {
            () = transport.wait_finished() => {
                debug!("command finished");
            }
            Some(()) = finished_rx.recv() => {
                if let Err(err) = kill_all(transport.as_ref(), transport.target_id(), KILL_SIGNAL).await {
                    debug!(error = %err, "kill on shutdown failed");
                }
            }
        }
        Ok(0)
    }

    async fn run_watching(&self, session: &Session, finished_rx: mpsc::Receiver<()>) -> Result<i32> {
        let root = self.watch_root()?;
        let filter = Arc::new(self.exclusion_filter()?);

        let (mut source, watch_rx) = self.watchers.create()?;
        let watched = build_watch_tree(self.fs.as_ref(), &root, &filter, source.as_mut())?;
        info!(root = ?root, directories = watched.len(), "watching for changes");

        let debouncer = Debouncer::new(self.options.debounce_window);
        let core = CoreRuntime::new(filter, self.options.kill_failure);
        let ports = PortSettings {
            docker_host: self.options.docker_host.clone(),
            published: self.options.publish_ports.clone(),
        };

        let runtime = Runtime::new(
            core,
            watch_rx,
            finished_rx,
            debouncer,
            session.clone(),
            self.code.clone(),
            ports,
        );
        let report = runtime.run().await;

        // Releases every watched directory.
        drop(source);
        debug!(kills = report.kills, restarts = report.restarts.len(), "watch finished");
        Ok(report.exit_code)
    }
}

impl Step for WatchStep {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn safe_id(&self) -> &str {
        &self.safe_id
    }

    fn execute<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, Result<i32>> {
        Box::pin(self.run(session))
    }

    fn fetch(&self) -> Result<String> {
        Ok(String::new())
    }

    fn collect_file(
        &self,
        _container_path: &str,
        _src: &str,
        _name: &str,
        _dst: &mut dyn Write,
    ) -> Result<()> {
        Ok(())
    }

    fn collect_artifact(&self, _path: &str) -> Result<Option<Artifact>> {
        Ok(None)
    }

    /// A path that never exists.
    fn report_path(&self, _parts: &[&str]) -> String {
        Uuid::new_v4().to_string()
    }

    fn should_sync_env(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::InterruptRegistry;

    fn cfg(name: Option<&str>) -> ConfigFile {
        let mut raw = crate::config::RawConfigFile::default();
        raw.step.name = name.map(str::to_string);
        raw.step.data.insert("code".into(), "echo hi".into());
        ConfigFile::try_from(raw).unwrap()
    }

    #[test]
    fn identity_defaults() {
        let step = WatchStep::new(&cfg(None), Arc::new(InterruptRegistry::new()));
        assert_eq!(step.id(), "watch");
        assert_eq!(step.name(), "watch");
        assert_eq!(step.display_name(), "watch");
        assert!(step.safe_id().starts_with("watch-"));
        assert!(!step.should_sync_env());
        assert_eq!(step.fetch().unwrap(), "");
        assert_eq!(step.collect_artifact("/out").unwrap(), None);
    }

    #[test]
    fn display_name_comes_from_config() {
        let step = WatchStep::new(&cfg(Some("dev server")), Arc::new(InterruptRegistry::new()));
        assert_eq!(step.display_name(), "dev server");
        assert_eq!(step.name(), "watch");
    }

    #[test]
    fn report_paths_are_unique() {
        let step = WatchStep::new(&cfg(None), Arc::new(InterruptRegistry::new()));
        assert_ne!(step.report_path(&["a"]), step.report_path(&["a"]));
    }
}
