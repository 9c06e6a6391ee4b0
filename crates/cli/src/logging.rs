//! Log output for the `power-dialer` binary
//!
//! Logs always go to stderr; stdout is reserved for the final report so that
//! `--output json` stays machine readable.

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Plain,
    Json,
}

/// Logging flags collected from the command line
#[derive(Debug, Clone)]
pub struct LogOptions {
    pub level: Level,
    pub format: LogFormat,
    /// Source file and line on every event
    pub file_info: bool,
    /// Span open and close events
    pub spans: bool,
}

impl LogOptions {
    /// `RUST_LOG` when set, otherwise `level` for the dialer and warnings only
    /// for everything else
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directives(self.level)))
    }

    fn span_events(&self) -> FmtSpan {
        if self.spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

fn default_directives(level: Level) -> String {
    let level = level.to_string().to_lowercase();
    format!("warn,rvoip_dialer_engine={level},power_dialer={level}")
}

/// Install the global subscriber
pub fn init(options: &LogOptions) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(options.filter())
        .with_span_events(options.span_events())
        .with_file(options.file_info)
        .with_line_number(options.file_info)
        .with_writer(std::io::stderr);

    let installed = match options.format {
        LogFormat::Plain => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

/// clap value parser for `--log-level`
pub fn parse_level(s: &str) -> std::result::Result<Level, String> {
    s.parse()
        .map_err(|_| format!("unknown log level '{}' (trace, debug, info, warn, error)", s))
}
