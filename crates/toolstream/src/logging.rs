use eyre::{Result, eyre};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing on stderr so stdout carries only conversation output.
///
/// The filter comes from `RUST_LOG`; without it the level is `warn`, or
/// `debug` when `verbose` is set.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(
            fmt::Layer::new()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .with(filter)
        .try_init()
        .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::debug!(target: "toolstream::logging", filter = fallback, "Tracing initialized");
    Ok(())
}
