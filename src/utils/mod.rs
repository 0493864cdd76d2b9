pub mod build_info;

use tracing_subscriber::{fmt, EnvFilter};

/// Directive applied when neither `RUST_LOG` nor the config names a filter.
pub const DEFAULT_LOG_FILTER: &str = "warn,fee_ledger=info";

/// Installs the global fmt subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `configured`; an unparsable directive falls back to the default.
pub fn init_tracing(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A subscriber installed by an embedding application stays in charge.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
