#![allow(dead_code)]

use std::path::Path;

use watchstep::config::{ConfigFile, RawConfigFile};
use watchstep::types::KillFailurePolicy;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(code: &str) -> Self {
        let mut config = RawConfigFile::default();
        config.step.data.insert("code".to_string(), code.to_string());
        Self { config }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.step.name = Some(name.to_string());
        self
    }

    pub fn reload(mut self, raw: &str) -> Self {
        self.config.step.data.insert("reload".to_string(), raw.to_string());
        self
    }

    pub fn project_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.options.project_path = path.as_ref().to_path_buf();
        self
    }

    pub fn build_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.options.build_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn step_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.options.step_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.options.debounce_ms = ms;
        self
    }

    pub fn kill_failure(mut self, policy: KillFailurePolicy) -> Self {
        self.config.options.kill_failure = policy;
        self
    }

    pub fn docker_host(mut self, host: &str) -> Self {
        self.config.docker.host = host.to_string();
        self
    }

    pub fn publish(mut self, port: &str) -> Self {
        self.config.docker.publish_ports.push(port.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}
