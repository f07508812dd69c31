use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use ::tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Initialize the tracing system
///
/// Installs a compact stderr formatter filtered by `RUST_LOG`, falling back
/// to [`DEFAULT_FILTER`]. ANSI colours are only used on a terminal. Fails if
/// a global subscriber is already set.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    init_with_default(DEFAULT_FILTER)
}

/// Like [`init`] with a different fallback filter directive
pub fn init_with_default(
    default_filter: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Span wrapping one entitlement check
pub fn check_span(query: &dyn std::fmt::Display) -> Span {
    span!(Level::DEBUG, "is_entitled", query = %query)
}

/// Span wrapping one stream scrub
pub fn scrub_span(stream_id: &dyn std::fmt::Display) -> Span {
    span!(Level::INFO, "scrub", stream_id = %stream_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_installs_global_subscriber_once() {
        assert!(init_with_default("debug").is_ok());
        assert!(init().is_err());

        let span = check_span(&"space(principal=0x01)");
        let _entered = span.enter();
        debug!("inside check span");
    }
}
