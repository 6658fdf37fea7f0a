//! Process-wide log subscriber for hosts embedding the broker.
//!
//! Broker events use the `speller_host::broker` and `speller_host::facade`
//! targets, so a filter such as `speller_host::broker=debug,warn` narrows
//! output to connection bookkeeping.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use speller_config::{Config, LogFormat};

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Settings the installed subscriber is running with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    filter: String,
}

impl TelemetryHandle {
    fn from_config(config: &Config) -> Self {
        Self {
            format: config.log_format(),
            filter: config.log_filter().to_owned(),
        }
    }

    /// Output format of the installed subscriber.
    #[must_use]
    pub const fn format(&self) -> LogFormat {
        self.format
    }

    /// Filter expression the subscriber was installed with.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Another subscriber already owns the global slot.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the broker's log subscriber on first use.
///
/// Later calls return the handle of the first installation, whatever
/// `config` they pass. A failed call installs nothing and may be retried.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] when the host installed its own subscriber.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| {
            let subscriber = build_subscriber(config)?;
            tracing::subscriber::set_global_default(subscriber)
                .map_err(TelemetryError::Subscriber)?;
            Ok(TelemetryHandle::from_config(config))
        })
        .cloned()
}

fn build_filter(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter(error.to_string()))
}

fn build_subscriber(
    config: &Config,
) -> Result<Box<dyn Subscriber + Send + Sync>, TelemetryError> {
    let builder = fmt::Subscriber::builder()
        .with_env_filter(build_filter(config.log_filter())?)
        .with_target(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    Ok(match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    })
}
