use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "STICKYNOTE_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

/// Installs the fmt subscriber. Safe to call more than once.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .try_init();
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}
