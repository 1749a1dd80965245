pub mod builders;
pub mod recording_runner;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{ConfigBuilder, JobBuilder};
pub use recording_runner::RecordingRunner;

static INIT: Once = Once::new();

/// Install a test-captured tracing subscriber once per test binary.
///
/// Output shows up for failing tests only; `RUST_LOG=debug` raises the
/// level.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Poll `check` every 20ms until it returns true or 5 seconds pass.
///
/// Returns the final result of `check`, so callers can
/// `assert!(eventually(..).await)`.
pub async fn eventually<F>(mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return check();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Give in-flight inotify events a moment to be delivered, for asserting
/// that something did **not** happen.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(300)).await;
}
