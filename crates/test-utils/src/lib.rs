pub mod builders;
pub mod fake_transport;
pub mod fake_watcher;

use std::sync::{Arc, Mutex, Once};
use tracing_subscriber::{fmt, EnvFilter};

use watchstep::exec::LineSink;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Sink that remembers every forwarded line (hidden ones included).
#[derive(Debug, Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(String, bool)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().map(|(l, _)| l.clone()).collect()
    }
}

impl LineSink for RecordingSink {
    fn emit(&self, line: &str, hidden: bool) {
        self.lines.lock().unwrap().push((line.to_string(), hidden));
    }
}
