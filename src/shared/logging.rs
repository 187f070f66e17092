use env_logger::{Builder, Env};

const DEFAULT_FILTER: &str = "warn";

/// Install the process-wide logger. `RUST_LOG` overrides the default `warn` level.
/// Calling it again is a no-op.
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp(None)
        .try_init();
}
