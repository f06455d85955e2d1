//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::config::LoggingConfig;

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable output on stderr.
    Console,
    /// One JSON object per event.
    Json,
}

impl TracingFormat {
    fn parse(s: &str) -> Self {
        match s {
            "json" => TracingFormat::Json,
            _ => TracingFormat::Console,
        }
    }
}

/// Resolved tracing settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Filter directive (e.g. "info", "qstudio_sync=debug").
    pub log_level: String,
    /// Output format.
    pub format: TracingFormat,
}

impl TracingConfig {
    /// Settings from the configuration file, raised by `-v` flags.
    ///
    /// `RUST_LOG` takes precedence over both when set.
    pub fn resolve(logging: &LoggingConfig, verbose: u8) -> Self {
        let log_level = match verbose {
            0 => logging.level.clone(),
            1 => "info".to_string(),
            2 => "debug".to_string(),
            _ => "trace".to_string(),
        };
        let log_level = std::env::var("RUST_LOG").unwrap_or(log_level);
        Self {
            log_level,
            format: TracingFormat::parse(&logging.format),
        }
    }
}

/// Install the global subscriber. Logs go to stderr so command output stays clean.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    let fmt_layer = match config.format {
        TracingFormat::Console => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed(),
        TracingFormat::Json => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_raises_level() {
        let logging = LoggingConfig {
            level: "error".to_string(),
            format: "json".to_string(),
        };
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(TracingConfig::resolve(&logging, 0).log_level, "error");
            assert_eq!(TracingConfig::resolve(&logging, 2).log_level, "debug");
            assert_eq!(TracingConfig::resolve(&logging, 5).log_level, "trace");
        }
        assert_eq!(TracingConfig::resolve(&logging, 0).format, TracingFormat::Json);
    }

    #[test]
    fn test_unknown_format_falls_back_to_console() {
        assert_eq!(TracingFormat::parse("xml"), TracingFormat::Console);
    }
}
