//! Subscriber setup for the binary. Library code only emits `tracing` events.

use tracing::subscriber::DefaultGuard;
use tracing::Level;

/// INFO by default, DEBUG with `--debug`.
pub fn level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Installs the fmt subscriber as the default of the current thread until the
/// returned guard is dropped. Logs go to stderr so stdout stays usable.
pub fn init(debug: bool) -> DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level(debug))
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_default(subscriber)
}
