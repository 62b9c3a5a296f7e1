//! Diagnostic output on stderr.

use tracing::Level;

/// Install the global fmt subscriber. Standard output stays reserved for plans.
pub fn init(verbose: bool) {
    let level = if verbose { Level::INFO } else { Level::WARN };
    // A subscriber may already be installed when embedded or under test.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
