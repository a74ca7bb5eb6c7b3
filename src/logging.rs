//! Diagnostic logging to stderr.
//!
//! Measurements go to stdout, so everything logged here goes to stderr where
//! it cannot corrupt the output a logger script parses.

use tracing_subscriber::EnvFilter;

/// Filter directives for a `-d` level, with raw frame tracing on top when
/// `trace` is set.
pub fn directives(debug_level: u8, trace: bool) -> String {
    let mut directives = match debug_level {
        0 => "warn".to_string(),
        1 => "warn,tac1100=debug,tac1100::locks=info".to_string(),
        2 => "warn,tac1100=info".to_string(),
        _ => "warn,tac1100=debug".to_string(),
    };
    if trace {
        directives.push_str(",tac1100::modbus=trace");
    }
    directives
}

/// Install the global subscriber. `RUST_LOG`, when set, replaces the
/// filter derived from the flags.
pub fn init(debug_level: u8, trace: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(debug_level, trace)));

    // A second init (tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
