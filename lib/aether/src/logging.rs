use sloggers::{Config, LoggerConfig};

pub use slog::{crit, debug, error, info, o, trace, warn, Discard, Logger};

/// Builds the terminal logger shared by all binaries.
pub fn init() -> Logger {
    let config: LoggerConfig = serdeconv::from_toml_str(
        r#"
type = "terminal"
level = "debug"
destination = "stderr"
"#,
    )
    .expect("Error parsing logger configuration");

    config.build_logger().expect("Error building logger")
}

/// A logger that swallows everything. Used by tests and constructors taking
/// an optional parent logger.
#[inline]
pub fn null() -> Logger {
    Logger::root(Discard, o!())
}
