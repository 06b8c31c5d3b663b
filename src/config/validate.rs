// src/config/validate.rs

use crate::config::model::{ConfigFile, PipelineOptions, RawConfigFile};
use crate::errors::{Result, WatchStepError};
use crate::types::parse_bool;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WatchStepError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let code = code_from_data(&raw)?;
        let reload = reload_from_data(&raw)?;
        validate_options(&raw)?;

        let mut options = PipelineOptions::from(raw.options);
        options.docker_bin = raw.docker.bin;
        options.docker_host = raw.docker.host;
        options.container = raw.docker.container;
        options.publish_ports = raw.docker.publish_ports;

        Ok(ConfigFile::new_unchecked(raw.step.name, code, reload, options))
    }
}

fn code_from_data(cfg: &RawConfigFile) -> Result<String> {
    match cfg.step.data.get("code") {
        Some(code) if !code.trim().is_empty() => Ok(code.clone()),
        _ => Err(WatchStepError::ConfigError(
            "[step.data].code must be a non-empty command".to_string(),
        )),
    }
}

/// `reload` defaults to false; anything that is not a recognised boolean is
/// fatal.
fn reload_from_data(cfg: &RawConfigFile) -> Result<bool> {
    match cfg.step.data.get("reload") {
        None => Ok(false),
        Some(raw) => parse_bool(raw).ok_or_else(|| {
            WatchStepError::ConfigError(format!(
                "[step.data].reload: invalid boolean {raw:?}"
            ))
        }),
    }
}

fn validate_options(cfg: &RawConfigFile) -> Result<()> {
    if cfg.options.debounce_ms == 0 {
        return Err(WatchStepError::ConfigError(
            "[options].debounce_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.docker.bin.trim().is_empty() {
        return Err(WatchStepError::ConfigError(
            "[docker].bin must not be empty".to_string(),
        ));
    }
    if cfg.options.ignore_file.trim().is_empty() {
        return Err(WatchStepError::ConfigError(
            "[options].ignore_file must not be empty".to_string(),
        ));
    }
    Ok(())
}
