//! Logging setup for the binary.
//!
//! Events go to stderr so stdout stays a clean JSON channel. `RUST_LOG`
//! wins when set; otherwise `warn`, or `debug` for this crate with
//! `--verbose`.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

/// Filter used when `RUST_LOG` is unset or unparsable
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "warn,goai_edit=debug" } else { "warn" }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init(verbose: bool, ansi: bool) {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(ansi)
                .with_target(verbose)
                .with_timer(ChronoUtc::rfc_3339()),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_enables_crate_debug() {
        assert_eq!(default_directive(false), "warn");
        assert!(default_directive(true).contains("goai_edit=debug"));
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
