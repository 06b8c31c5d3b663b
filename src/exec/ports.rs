// src/exec/ports.rs

//! Works out where published container ports can be reached from the host.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, WatchStepError};

static DOCKER_HOST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<scheme>[a-z][a-z0-9+.-]*)://(?P<host>\[[^\]]*\]|[^:/]*)(?::(?P<port>\d+))?")
        .expect("valid docker host regex")
});

/// One forwarded port, e.g. `192.168.99.100:8080` → `80`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMap {
    pub host_uri: String,
    pub container_port: String,
}

/// Host name published ports are reachable on for a given docker host URL.
///
/// Local sockets (`unix://`, `npipe://`) and an empty host map to
/// `localhost`.
pub fn docker_host_name(docker_host: &str) -> Result<String> {
    let docker_host = docker_host.trim();
    if docker_host.is_empty() {
        return Ok("localhost".to_string());
    }

    let caps = DOCKER_HOST.captures(docker_host).ok_or_else(|| {
        WatchStepError::ConfigError(format!("unparseable docker host: {docker_host}"))
    })?;

    let scheme = &caps["scheme"];
    let host = &caps["host"];
    if matches!(scheme, "unix" | "npipe") || host.is_empty() {
        return Ok("localhost".to_string());
    }
    Ok(host.to_string())
}

/// Compute host URIs for each published port spec.
///
/// Accepted specs: `container`, `host:container`, `ip:host:container`; the
/// container part may carry a `/proto` suffix.
pub fn exposed_port_maps(docker_host: &str, published: &[String]) -> Result<Vec<PortMap>> {
    let host = docker_host_name(docker_host)?;

    published
        .iter()
        .map(|spec| {
            let parts: Vec<&str> = spec.trim().split(':').collect();
            let (host_uri, container_port) = match parts.as_slice() {
                [container] => (format!("{host}:{}", strip_proto(container)), *container),
                [host_port, container] => (format!("{host}:{host_port}"), *container),
                [ip, host_port, container] => (format!("{ip}:{host_port}"), *container),
                _ => {
                    return Err(WatchStepError::ConfigError(format!(
                        "invalid published port: {spec}"
                    )));
                }
            };
            if container_port.is_empty() {
                return Err(WatchStepError::ConfigError(format!(
                    "invalid published port: {spec}"
                )));
            }
            Ok(PortMap {
                host_uri,
                container_port: container_port.to_string(),
            })
        })
        .collect()
}

fn strip_proto(port: &str) -> &str {
    port.split_once('/').map_or(port, |(p, _)| p)
}
