//! Match log sink.
//!
//! Every non control-plane evaluation reports whether a request matched an
//! expectation, and the store reports expectation lifecycle changes. The sink
//! is a trait object so tests can swap in [`NoOpMatchLog`] or inspect events
//! through [`InMemoryMatchLog`].

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchLogType {
    ExpectationMatched,
    ExpectationNotMatched,
    CreatedExpectation,
    UpdatedExpectation,
    RemovedExpectation,
    Cleared,
}

impl MatchLogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLogType::ExpectationMatched => "EXPECTATION_MATCHED",
            MatchLogType::ExpectationNotMatched => "EXPECTATION_NOT_MATCHED",
            MatchLogType::CreatedExpectation => "CREATED_EXPECTATION",
            MatchLogType::UpdatedExpectation => "UPDATED_EXPECTATION",
            MatchLogType::RemovedExpectation => "REMOVED_EXPECTATION",
            MatchLogType::Cleared => "CLEARED",
        }
    }
}

impl fmt::Display for MatchLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchLogEvent {
    #[serde(rename = "type")]
    pub log_type: MatchLogType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expectation_id: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub because: Option<String>,
}

impl MatchLogEvent {
    pub fn new(log_type: MatchLogType, message: impl Into<String>) -> Self {
        Self {
            log_type,
            correlation_id: None,
            expectation_id: None,
            message: message.into(),
            because: None,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_expectation_id(mut self, expectation_id: Option<&str>) -> Self {
        self.expectation_id = expectation_id.map(str::to_string);
        self
    }

    pub fn with_because(mut self, because: impl Into<String>) -> Self {
        self.because = Some(because.into());
        self
    }
}

/// Destination for match and lifecycle events.
pub trait MatchLog: Send + Sync + fmt::Debug {
    fn log_event(&self, event: MatchLogEvent);

    /// Whether match events are wanted at all. Callers skip building
    /// messages when this is `false`.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Emits events through `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingMatchLog;

impl MatchLog for TracingMatchLog {
    fn is_enabled(&self) -> bool {
        tracing::enabled!(tracing::Level::INFO)
    }

    fn log_event(&self, event: MatchLogEvent) {
        tracing::info!(
            log_type = event.log_type.as_str(),
            expectation_id = event.expectation_id.as_deref().unwrap_or(""),
            correlation_id = event.correlation_id.as_deref().unwrap_or(""),
            because = event.because.as_deref().unwrap_or(""),
            "{}",
            event.message
        );
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoOpMatchLog;

impl MatchLog for NoOpMatchLog {
    fn log_event(&self, _event: MatchLogEvent) {}

    fn is_enabled(&self) -> bool {
        false
    }
}

/// Retains events so they can be inspected later.
#[derive(Debug, Default)]
pub struct InMemoryMatchLog {
    events: Mutex<Vec<MatchLogEvent>>,
}

impl InMemoryMatchLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MatchLogEvent> {
        self.events.lock().clone()
    }

    pub fn events_of(&self, log_type: MatchLogType) -> Vec<MatchLogEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.log_type == log_type)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl MatchLog for InMemoryMatchLog {
    fn log_event(&self, event: MatchLogEvent) {
        self.events.lock().push(event);
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Safe to call more
/// than once.
pub fn init_logging(format: LogFormat, default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    match format {
        LogFormat::Text => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
