//! Log sink setup.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins when set; otherwise the level follows the `debug` setting.
/// Calling this twice is harmless.
pub fn init_tracing(debug: bool) {
    let fallback = if debug { "wakatime_agent=debug" } else { "wakatime_agent=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let use_ansi = std::env::var_os("NO_COLOR").is_none();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(use_ansi)
        .with_writer(std::io::stderr)
        .try_init();
}
