// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod signal;
pub mod step;
pub mod types;
pub mod watch;

use std::sync::Arc;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate};
use crate::errors::{Result, WatchStepError};
use crate::exec::{DockerTransport, Session};
use crate::signal::{listen_for_ctrl_c, InterruptRegistry};
use crate::step::{Step, WatchStep};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the docker transport + session
/// - Ctrl-C routed through the interrupt registry
/// - the watch step itself
///
/// Returns the step's exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = args.config.unwrap_or_else(default_config_path);
    debug!(path = ?config_path, "loading config");
    let mut cfg = load_and_validate(&config_path)?;

    if let Some(container) = args.container {
        cfg.options.container = Some(container);
    }

    let registry = Arc::new(InterruptRegistry::new());
    let step = WatchStep::new(&cfg, registry.clone());

    if args.dry_run {
        print_dry_run(&step)?;
        return Ok(0);
    }

    let container = cfg.options.container.clone().ok_or_else(|| {
        WatchStepError::ConfigError(
            "no container given ([docker].container or --container)".to_string(),
        )
    })?;

    let (transport, output_rx) = DockerTransport::new(container);
    let transport = transport.with_docker_bin(cfg.options.docker_bin.clone());
    let session = Session::new(Arc::new(transport), output_rx).with_logs_hidden(args.hide_output);

    listen_for_ctrl_c(registry);

    step.execute(&session).await
}

/// Simple dry-run output: the resolved step and its exclusion patterns.
fn print_dry_run(step: &WatchStep) -> Result<()> {
    println!("watchstep dry-run");
    println!("  step: {} ({})", step.display_name(), step.safe_id());
    println!("  code: {}", step.code());
    println!("  reload: {}", step.reload());

    let options = step.options();
    println!("  debounce: {:?}", options.debounce_window);
    println!("  kill_failure: {:?}", options.kill_failure);
    if let Some(ref container) = options.container {
        println!("  container: {container}");
    }
    if !options.publish_ports.is_empty() {
        println!("  publish_ports: {:?}", options.publish_ports);
    }

    if step.reload() {
        let root = step.watch_root()?;
        let filter = step.exclusion_filter()?;
        println!();
        println!("watch root: {}", root.display());
        println!("exclusions ({}):", filter.len());
        for pattern in filter.patterns() {
            println!("  - {} ({:?})", pattern, pattern.scope);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
