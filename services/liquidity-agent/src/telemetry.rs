//! Telemetry and structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured `LOG_LEVEL` applies.
//! Every enabled record from this crate is also captured in the log journal.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::journal::{JournalLayer, LogJournal};

/// Install the global subscriber and return the journal it feeds
pub fn init_telemetry(logging: &LoggingConfig) -> anyhow::Result<LogJournal> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let journal = LogJournal::default();

    let (compact, json) = match logging.format {
        LogFormat::Compact => (
            Some(fmt::layer().with_target(false).with_level(true).compact()),
            None,
        ),
        LogFormat::Json => (None, Some(fmt::layer().json().with_current_span(false))),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(compact)
        .with(json)
        .with(JournalLayer::new(journal.clone()))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))?;

    Ok(journal)
}
