//! Diagnostics for ciexec runs
//!
//! Spans and events go to stderr. Stdout belongs to the captured command
//! output and to `--json` results.

use tracing_subscriber::EnvFilter;

/// Level used when the requested one cannot be parsed
const FALLBACK_LEVEL: &str = "warn";

/// Installs the global subscriber
///
/// `RUST_LOG` takes precedence over `level` when it is set and valid.
pub fn init_logging(level: &str) {
    let rust_log = std::env::var("RUST_LOG").ok();

    tracing_subscriber::fmt()
        .with_env_filter(run_filter(level, rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .init();
}

fn run_filter(level: &str, rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_LEVEL))
}
