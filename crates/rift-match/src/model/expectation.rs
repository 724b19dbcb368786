//! Expectations and their consumption limits.

use super::definition::RequestDefinition;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Remaining number of times an expectation may be matched.
#[derive(Debug)]
pub struct Times {
    remaining: AtomicI64,
    unlimited: bool,
}

impl Times {
    pub fn unlimited() -> Self {
        Self {
            remaining: AtomicI64::new(0),
            unlimited: true,
        }
    }

    pub fn exactly(count: u32) -> Self {
        Self {
            remaining: AtomicI64::new(i64::from(count)),
            unlimited: false,
        }
    }

    pub fn once() -> Self {
        Self::exactly(1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    pub fn remaining_times(&self) -> i64 {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn greater_than_zero(&self) -> bool {
        self.unlimited || self.remaining_times() > 0
    }

    /// Consume one use. Returns false if nothing was left to consume.
    pub fn decrement(&self) -> bool {
        if self.unlimited {
            return true;
        }
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current > 0).then(|| current - 1)
            })
            .is_ok()
    }
}

impl Clone for Times {
    fn clone(&self) -> Self {
        Self {
            remaining: AtomicI64::new(self.remaining_times()),
            unlimited: self.unlimited,
        }
    }
}

impl PartialEq for Times {
    fn eq(&self, other: &Self) -> bool {
        self.unlimited == other.unlimited
            && (self.unlimited || self.remaining_times() == other.remaining_times())
    }
}

impl Default for Times {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimesRaw {
    #[serde(default)]
    remaining_times: i64,
    #[serde(default)]
    unlimited: bool,
}

impl Serialize for Times {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TimesRaw {
            remaining_times: self.remaining_times(),
            unlimited: self.unlimited,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Times {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = TimesRaw::deserialize(deserializer)?;
        Ok(Self {
            remaining: AtomicI64::new(raw.remaining_times.max(0)),
            unlimited: raw.unlimited,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn duration(&self, amount: i64) -> Option<Duration> {
        match self {
            TimeUnit::Milliseconds => Duration::try_milliseconds(amount),
            TimeUnit::Seconds => Duration::try_seconds(amount),
            TimeUnit::Minutes => Duration::try_minutes(amount),
            TimeUnit::Hours => Duration::try_hours(amount),
            TimeUnit::Days => Duration::try_days(amount),
        }
    }
}

/// How long an expectation stays registered after creation.
#[derive(Debug, Clone)]
pub struct TimeToLive {
    time_unit: TimeUnit,
    time_to_live: i64,
    unlimited: bool,
    created: DateTime<Utc>,
    end_date: OnceCell<Option<DateTime<Utc>>>,
}

impl TimeToLive {
    pub fn unlimited() -> Self {
        Self {
            time_unit: TimeUnit::default(),
            time_to_live: 0,
            unlimited: true,
            created: Utc::now(),
            end_date: OnceCell::new(),
        }
    }

    pub fn exactly(time_unit: TimeUnit, time_to_live: i64) -> Self {
        Self {
            time_unit,
            time_to_live,
            unlimited: false,
            created: Utc::now(),
            end_date: OnceCell::new(),
        }
    }

    /// Restart the clock, keeping the configured duration.
    pub fn restarted(&self) -> Self {
        Self {
            created: Utc::now(),
            end_date: OnceCell::new(),
            ..self.clone()
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.unlimited
    }

    /// `None` when the expectation never expires. A duration past the
    /// representable range counts as never expiring, or as already expired
    /// when negative.
    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        if self.unlimited {
            return None;
        }
        *self.end_date.get_or_init(|| {
            let end = self
                .time_unit
                .duration(self.time_to_live)
                .and_then(|ttl| self.created.checked_add_signed(ttl));
            match end {
                Some(end) => Some(end),
                None if self.time_to_live < 0 => Some(DateTime::<Utc>::MIN_UTC),
                None => None,
            }
        })
    }

    pub fn still_alive(&self) -> bool {
        self.still_alive_at(Utc::now())
    }

    pub fn still_alive_at(&self, now: DateTime<Utc>) -> bool {
        match self.end_date() {
            None => true,
            Some(end) => now <= end,
        }
    }
}

impl PartialEq for TimeToLive {
    fn eq(&self, other: &Self) -> bool {
        self.unlimited == other.unlimited
            && (self.unlimited
                || (self.time_unit == other.time_unit && self.time_to_live == other.time_to_live))
    }
}

impl Default for TimeToLive {
    fn default() -> Self {
        Self::unlimited()
    }
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct TimeToLiveRaw {
    #[serde(default)]
    time_unit: TimeUnit,
    #[serde(default)]
    time_to_live: i64,
    #[serde(default)]
    unlimited: bool,
}

impl Serialize for TimeToLive {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TimeToLiveRaw {
            time_unit: self.time_unit,
            time_to_live: self.time_to_live,
            unlimited: self.unlimited,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TimeToLive {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = TimeToLiveRaw::deserialize(deserializer)?;
        Ok(if raw.unlimited {
            Self::unlimited()
        } else {
            Self::exactly(raw.time_unit, raw.time_to_live)
        })
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// An expected request plus what to do when it arrives.
///
/// Actions are carried as opaque JSON: executing them is outside the match
/// engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    #[serde(default = "new_id")]
    pub id: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(skip)]
    pub created: u64,
    pub http_request: RequestDefinition,
    #[serde(default)]
    pub times: Times,
    #[serde(default)]
    pub time_to_live: TimeToLive,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_forward: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_error: Option<Value>,
}

impl Expectation {
    pub fn when(request: impl Into<RequestDefinition>) -> Self {
        Self {
            id: new_id(),
            priority: 0,
            created: 0,
            http_request: request.into(),
            times: Times::unlimited(),
            time_to_live: TimeToLive::unlimited(),
            http_response: None,
            http_forward: None,
            http_error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_times(mut self, times: Times) -> Self {
        self.times = times;
        self
    }

    pub fn with_time_to_live(mut self, time_to_live: TimeToLive) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    pub fn with_created(mut self, created: u64) -> Self {
        self.created = created;
        self
    }

    pub fn then_respond(mut self, response: Value) -> Self {
        self.http_response = Some(response);
        self
    }

    pub fn then_forward(mut self, forward: Value) -> Self {
        self.http_forward = Some(forward);
        self
    }

    pub fn then_error(mut self, error: Value) -> Self {
        self.http_error = Some(error);
        self
    }

    /// Label of the configured action, used for metrics.
    pub fn action_kind(&self) -> &'static str {
        if self.http_response.is_some() {
            "response"
        } else if self.http_forward.is_some() {
            "forward"
        } else if self.http_error.is_some() {
            "error"
        } else {
            "none"
        }
    }

    pub fn is_active(&self) -> bool {
        self.times.greater_than_zero() && self.time_to_live.still_alive()
    }
}
