//! Log journal - a bounded ring of structured log records
//!
//! [`JournalLayer`] captures every enabled event from this crate as a
//! `{timestamp, tag, message, severity}` record. When a journal path is
//! configured the ring is periodically written out as a JSON array for an
//! external log viewer to poll.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::fs;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

pub const JOURNAL_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub tag: String,
    pub message: String,
    pub severity: String,
}

/// Shared ring of the most recent records, oldest evicted first
#[derive(Debug, Clone)]
pub struct LogJournal {
    records: Arc<Mutex<VecDeque<LogRecord>>>,
    capacity: usize,
}

impl LogJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, record: LogRecord) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        records.push_back(record);
        while records.len() > self.capacity {
            records.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<LogRecord> {
        match self.records.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the current ring to `path` as a pretty JSON array
    pub async fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        fs::write(path, json).await?;
        Ok(())
    }
}

impl Default for LogJournal {
    fn default() -> Self {
        Self::new(JOURNAL_CAPACITY)
    }
}

/// Flush the journal to `path` every `every` until the process exits
pub async fn run_journal_writer(journal: LogJournal, path: PathBuf, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        if let Err(e) = journal.write_to(&path).await {
            tracing::warn!(tag = "WARN", "Log journal write to {} failed: {}", path.display(), e);
        }
    }
}

pub struct JournalLayer {
    journal: LogJournal,
    target_prefix: &'static str,
}

impl JournalLayer {
    pub fn new(journal: LogJournal) -> Self {
        Self {
            journal,
            target_prefix: env!("CARGO_CRATE_NAME"),
        }
    }
}

#[derive(Default)]
struct RecordVisitor {
    tag: Option<String>,
    message: String,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "tag" => self.tag = Some(value.to_string()),
            "message" => self.message = value.to_string(),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "tag" => self.tag = Some(format!("{:?}", value).trim_matches('"').to_string()),
            "message" => self.message = format!("{:?}", value),
            _ => {}
        }
    }
}

fn default_tag(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "ERROR",
        Level::WARN => "WARN",
        _ => "INFO",
    }
}

impl<S: Subscriber> Layer<S> for JournalLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with(self.target_prefix) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        self.journal.push(LogRecord {
            timestamp: chrono::Utc::now().to_rfc3339(),
            tag: visitor
                .tag
                .unwrap_or_else(|| default_tag(metadata.level()).to_string()),
            message: visitor.message,
            severity: metadata.level().to_string(),
        });
    }
}
