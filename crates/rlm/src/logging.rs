//! Diagnostic logging.
//!
//! Events go to stderr so they never mix with snippet output printed on stdout.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `RLM_LOG=rlm=debug`.
pub const LOG_ENV: &str = "RLM_LOG";

const DEFAULT_FILTER: &str = "warn";

static INIT_ONCE: Once = Once::new();

/// Installs the global subscriber; later calls are no-ops.
pub fn init() {
    INIT_ONCE.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // another subscriber may already be installed by an embedding application
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
