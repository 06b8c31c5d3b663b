// src/exec/kill.rs

//! Signals every process in the environment except PID 1.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::errors::{Result, WatchStepError};

use super::transport::ExecTransport;

static SIGNAL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:SIG)?([A-Z0-9]+)$").expect("valid signal regex"));

/// Normalise a signal name (`INT`, `SIGTERM`, `9`) for `kill -s`.
pub fn normalize_signal(signal: &str) -> Result<String> {
    SIGNAL_NAME
        .captures(signal.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| WatchStepError::ProcessKill(format!("invalid signal name: {signal:?}")))
}

/// The shell pipeline run inside the environment.
pub fn kill_command(signal: &str) -> Result<Vec<String>> {
    let signal = normalize_signal(signal)?;
    Ok(vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!(
            r#"ps | grep -v PID | awk "{{if (\$1 != 1) print \$1}}" | xargs -n 1 kill -s {signal}"#
        ),
    ])
}

/// Send `signal` to every process in `target` except its init process.
pub async fn kill_all(transport: &dyn ExecTransport, target: &str, signal: &str) -> Result<()> {
    let argv = kill_command(signal)?;
    debug!(target, signal, "killing processes");

    transport
        .exec_one(target, argv)
        .await
        .map(|output| {
            if !output.is_empty() {
                debug!(target, %output, "kill output");
            }
        })
        .map_err(|e| WatchStepError::ProcessKill(format!("{target}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_names_are_normalised() {
        assert_eq!(normalize_signal("INT").unwrap(), "INT");
        assert_eq!(normalize_signal("SIGTERM").unwrap(), "TERM");
        assert_eq!(normalize_signal("9").unwrap(), "9");
        assert!(normalize_signal("INT; rm -rf /").is_err());
        assert!(normalize_signal("").is_err());
    }

    #[test]
    fn command_skips_pid_one() {
        let argv = kill_command("INT").unwrap();
        assert_eq!(argv[0], "/bin/sh");
        assert_eq!(argv[1], "-c");
        assert_eq!(
            argv[2],
            r#"ps | grep -v PID | awk "{if (\$1 != 1) print \$1}" | xargs -n 1 kill -s INT"#
        );
    }
}
