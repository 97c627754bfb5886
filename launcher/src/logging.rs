//! Tracing setup for the launcher CLI.
//!
//! Output goes to stderr so the tester subprocess keeps stdout to itself in
//! the CI log. `RUST_LOG` takes precedence when set; otherwise `--debug`
//! (or `LAUNCHER_DEBUG` in the environment) selects `debug`, else `info`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber.
pub fn init(debug: bool) {
    let default = if debug || std::env::var_os("LAUNCHER_DEBUG").is_some() {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
