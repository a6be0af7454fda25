use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber writing to stderr.
///
/// `RUST_LOG` wins over `level` when set. Calling this more than once is a no-op.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();

    let _ = subscriber.try_init();
}
