// tests/config_loading.rs

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use watchstep::config::load_and_validate;
use watchstep::errors::WatchStepError;
use watchstep::types::KillFailurePolicy;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn full_config_is_loaded() {
    let file = config_file(
        r#"
[step]
name = "dev server"

[step.data]
code = "python main.py"
reload = "true"

[options]
project_path = "/src/app"
build_dir = "/pipeline/output"
debounce_ms = 500
kill_failure = "abort"

[docker]
host = "tcp://10.0.0.5:2376"
container = "abc123"
publish_ports = ["8080:80", "5000"]
"#,
    );

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.name.as_deref(), Some("dev server"));
    assert_eq!(cfg.code, "python main.py");
    assert!(cfg.reload);
    assert_eq!(cfg.options.project_path.to_str(), Some("/src/app"));
    assert_eq!(
        cfg.options.step_dirs.build_dir.as_deref().and_then(|p| p.to_str()),
        Some("/pipeline/output")
    );
    assert_eq!(cfg.options.debounce_window, Duration::from_millis(500));
    assert_eq!(cfg.options.kill_failure, KillFailurePolicy::Abort);
    assert_eq!(cfg.options.container.as_deref(), Some("abc123"));
    assert_eq!(cfg.options.publish_ports, vec!["8080:80", "5000"]);
}

#[test]
fn minimal_config_gets_defaults() {
    let file = config_file("[step.data]\ncode = \"make run\"\n");

    let cfg = load_and_validate(file.path()).unwrap();
    assert!(!cfg.reload);
    assert_eq!(cfg.options.ignore_file, ".gitignore");
    assert_eq!(cfg.options.debounce_window, Duration::from_secs(2));
    assert_eq!(cfg.options.kill_failure, KillFailurePolicy::Continue);
    assert!(cfg.options.container.is_none());
}

#[test]
fn invalid_reload_value_is_a_config_error() {
    let file = config_file("[step.data]\ncode = \"x\"\nreload = \"sometimes\"\n");

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, WatchStepError::ConfigError(ref msg) if msg.contains("sometimes")));
}

#[test]
fn unknown_kill_policy_is_a_parse_error() {
    let file = config_file("[step.data]\ncode = \"x\"\n\n[options]\nkill_failure = \"retry\"\n");

    let err = load_and_validate(file.path()).unwrap_err();
    assert!(matches!(err, WatchStepError::TomlError(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = load_and_validate("/definitely/not/here/WatchStep.toml").unwrap_err();
    assert!(matches!(err, WatchStepError::IoError(_)));
}
