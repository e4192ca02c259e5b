//! Log subscriber setup.
//!
//! `PROFILE_LENS_LOG` (then `RUST_LOG`) holds the filter directive and
//! `PROFILE_LENS_LOG_FORMAT` picks one of `pretty`, `compact` or `json`.
//! Anything unparsable falls back to `profile_lens=info,warn`, pretty.

use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

const DEFAULT_FILTER: &str = "profile_lens=info,warn";
const VERBOSE_FILTER: &str = "profile_lens=debug,info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    /// Case-insensitive; unknown names mean `Pretty`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub filter: String,
    pub format: LogFormat,
    /// Emit span open/close events (render and proxy spans).
    pub with_spans: bool,
    /// Attach source file and line to each event.
    pub with_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: LogFormat::default(),
            with_spans: false,
            with_file: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let filter = std::env::var("PROFILE_LENS_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string());
        let format = std::env::var("PROFILE_LENS_LOG_FORMAT")
            .map(|s| LogFormat::parse(&s))
            .unwrap_or_default();

        Self {
            filter,
            format,
            ..Self::default()
        }
    }

    /// `--verbose`: debug for this crate, with source locations and spans.
    pub fn verbose() -> Self {
        Self {
            filter: VERBOSE_FILTER.to_string(),
            with_spans: true,
            with_file: true,
            ..Self::from_env()
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.with_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_span_events(span_events)
            .with_file(self.with_file)
            .with_line_number(self.with_file);

        match self.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Compact => layer.compact().boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
        }
    }
}

/// Install the global subscriber. Only the first call has an effect.
pub fn init(config: LogConfig) {
    let subscriber = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter());
    let _ = tracing::subscriber::set_global_default(subscriber);
}
