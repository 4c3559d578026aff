//! Log output to stderr; stdout belongs to the remote shell

use tracing_subscriber::EnvFilter;

/// Filter used when RUST_LOG is not set
pub fn default_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "warn,temp_ssh_access=info",
        2 => "info,temp_ssh_access=debug",
        _ => "trace",
    }
}

/// Install the global subscriber. RUST_LOG takes precedence over `-v`.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbosity)));

    // a second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
