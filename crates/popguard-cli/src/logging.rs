use tracing_subscriber::EnvFilter;

use popguard_core::config::LoggingConfig;

/// `RUST_LOG` wins over the configured filter. Output goes to stderr so report
/// output on stdout stays clean.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
