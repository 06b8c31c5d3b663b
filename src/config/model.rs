// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::types::KillFailurePolicy;
use crate::watch::{StepDirs, DEFAULT_IGNORE_FILE, DEFAULT_QUIET_WINDOW};

/// Raw configuration as read from a TOML file.
///
/// ```toml
/// [step]
/// name = "serve"
/// [step.data]
/// code = "python app.py"
/// reload = "true"
///
/// [options]
/// project_path = "."
/// build_dir = "/pipeline/output"
///
/// [docker]
/// container = "3f2a..."
/// publish_ports = ["8080:80"]
/// ```
///
/// All sections are optional here; [`ConfigFile`] is the validated form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub step: StepSection,

    #[serde(default)]
    pub options: OptionsSection,

    #[serde(default)]
    pub docker: DockerSection,
}

/// `[step]` section: the step's identity and its free-form `data` map.
///
/// `data.code` and `data.reload` are strings, as step data always is.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StepSection {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// `[options]` section: paths and reload tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct OptionsSection {
    /// Root of the project on this machine; the watch root.
    #[serde(default = "default_project_path")]
    pub project_path: PathBuf,

    /// Step scratch directory, excluded from watching.
    #[serde(default)]
    pub step_dir: Option<PathBuf>,

    /// Project directory as seen by the pipeline, excluded from watching.
    #[serde(default)]
    pub project_dir: Option<PathBuf>,

    /// Build output directory, excluded from watching.
    #[serde(default)]
    pub build_dir: Option<PathBuf>,

    /// Ignore-file looked up at the project root.
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,

    /// Debounce quiet window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub kill_failure: KillFailurePolicy,
}

fn default_project_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_ignore_file() -> String {
    DEFAULT_IGNORE_FILE.to_string()
}

fn default_debounce_ms() -> u64 {
    DEFAULT_QUIET_WINDOW.as_millis() as u64
}

impl Default for OptionsSection {
    fn default() -> Self {
        Self {
            project_path: default_project_path(),
            step_dir: None,
            project_dir: None,
            build_dir: None,
            ignore_file: default_ignore_file(),
            debounce_ms: default_debounce_ms(),
            kill_failure: KillFailurePolicy::default(),
        }
    }
}

/// `[docker]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DockerSection {
    /// Docker CLI binary used for `exec`.
    #[serde(default = "default_docker_bin")]
    pub bin: String,

    /// Docker host URL, used to work out where published ports are reachable.
    #[serde(default)]
    pub host: String,

    /// Container the command runs in. Can be overridden on the CLI.
    #[serde(default)]
    pub container: Option<String>,

    #[serde(default)]
    pub publish_ports: Vec<String>,
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

impl Default for DockerSection {
    fn default() -> Self {
        Self {
            bin: default_docker_bin(),
            host: String::new(),
            container: None,
            publish_ports: Vec::new(),
        }
    }
}

/// Pipeline-level options the step consumes.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub project_path: PathBuf,
    pub step_dirs: StepDirs,
    pub ignore_file: String,
    pub debounce_window: Duration,
    pub kill_failure: KillFailurePolicy,
    pub docker_bin: String,
    pub docker_host: String,
    pub container: Option<String>,
    pub publish_ports: Vec<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(OptionsSection::default())
    }
}

impl From<OptionsSection> for PipelineOptions {
    fn from(o: OptionsSection) -> Self {
        Self {
            project_path: o.project_path,
            step_dirs: StepDirs {
                step_dir: o.step_dir,
                project_dir: o.project_dir,
                build_dir: o.build_dir,
            },
            ignore_file: o.ignore_file,
            debounce_window: Duration::from_millis(o.debounce_ms),
            kill_failure: o.kill_failure,
            docker_bin: default_docker_bin(),
            docker_host: String::new(),
            container: None,
            publish_ports: Vec::new(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub code: String,
    pub reload: bool,
    pub options: PipelineOptions,
}

impl ConfigFile {
    /// Construct without validation. Prefer `ConfigFile::try_from(raw)`.
    pub(crate) fn new_unchecked(
        name: Option<String>,
        code: String,
        reload: bool,
        options: PipelineOptions,
    ) -> Self {
        Self {
            name,
            code,
            reload,
            options,
        }
    }
}
