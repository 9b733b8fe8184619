//! Logging setup and the in-process operation tracer.

pub mod tracer;

pub use tracer::{ActiveSpan, BufferTracer, Tracer, DEFAULT_TRACE_BUFFER};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the process log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Installs the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` filter. Calling this twice leaves the first subscriber in
/// place.
///
/// # Errors
///
/// Returns an error if `RUST_LOG` holds an invalid filter directive.
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    match format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(false),
            )
            .try_init()
            .ok(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .ok(),
    };

    Ok(())
}
