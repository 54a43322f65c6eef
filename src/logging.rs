use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Initializes the global tracing subscriber. `RUST_LOG` wins over the
/// configured level. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.log_json {
        let _ = tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}
