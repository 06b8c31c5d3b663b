use std::str::FromStr;
use serde::Deserialize;

/// What the reload loop does when killing the previous command fails right
/// after a debounce fire.
///
/// - `Continue`: log a warning and restart anyway (default). A failed kill
///   usually means the processes already exited or the container is gone.
/// - `Abort`: stop the reload loop with a non-zero exit code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillFailurePolicy {
    #[default]
    Continue,
    Abort,
}

impl FromStr for KillFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "continue" => Ok(KillFailurePolicy::Continue),
            "abort" => Ok(KillFailurePolicy::Abort),
            other => Err(format!(
                "invalid kill_failure: {other} (expected \"continue\" or \"abort\")"
            )),
        }
    }
}

/// Kind of filesystem change reported by the notification source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
    Other,
}

impl ChangeKind {
    /// Only content-affecting operations cause a reload.
    pub fn triggers_reload(self) -> bool {
        matches!(self, ChangeKind::Create | ChangeKind::Write | ChangeKind::Remove)
    }
}

/// Parse a boolean the way step data is written in pipeline files:
/// `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
