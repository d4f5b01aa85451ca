//! Audit counters for one-time-key lifecycle events reported by apps and
//! servers.
//!
//! Events are attributed to the region of the bearer token that reported them.
//! Tokens without a real region are attributed to the raw token instead, and
//! are masked whenever they appear in logs.

pub mod auth;
pub mod store;

pub use auth::{Authenticator, TokenTable};
pub use store::{EventBucket, EventStore, MemoryEventStore};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use common::protocol::EventRequest;
use thiserror::Error;
use tracing::{debug, warn};

use auth::UNMAPPED_REGION;

/// Errors from recording an event.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("invalid Device Type: ({0})")]
    InvalidDeviceType(String),

    #[error("invalid EventType: ({0})")]
    InvalidEventType(String),

    #[error("invalid date: ({0})")]
    InvalidDate(String),

    #[error("event store failure: {0}")]
    Store(String),
}

impl EventError {
    /// `true` if the event itself was malformed, as opposed to a backend fault.
    pub fn is_invalid_event(&self) -> bool {
        !matches!(self, EventError::Store(_))
    }
}

/// Kind of device that reported an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Android,
    Ios,
    Server,
}

impl FromStr for DeviceType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Android" => Ok(DeviceType::Android),
            "iOS" => Ok(DeviceType::Ios),
            "Server" => Ok(DeviceType::Server),
            other => Err(EventError::InvalidDeviceType(other.to_owned())),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeviceType::Android => "Android",
            DeviceType::Ios => "iOS",
            DeviceType::Server => "Server",
        })
    }
}

/// One-time-key lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    OtkClaimed,
    OtkGenerated,
    OtkExpired,
}

impl FromStr for EventType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OTKClaimed" => Ok(EventType::OtkClaimed),
            "OTKGenerated" => Ok(EventType::OtkGenerated),
            "OTKExpired" => Ok(EventType::OtkExpired),
            other => Err(EventError::InvalidEventType(other.to_owned())),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventType::OtkClaimed => "OTKClaimed",
            EventType::OtkGenerated => "OTKGenerated",
            EventType::OtkExpired => "OTKExpired",
        })
    }
}

/// A validated event, ready to be counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub identifier: EventType,
    pub device_type: DeviceType,
    pub date: NaiveDate,
    pub count: u32,
    /// Bearer token of the reporter.
    pub originator: String,
}

impl Event {
    /// Validate a wire request reported by `originator`.
    ///
    /// Device type is checked before event type, then the date.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field as an [`EventError`].
    pub fn from_request(req: &EventRequest, originator: &str) -> Result<Self, EventError> {
        let device_type = req.device_type.parse()?;
        let identifier = req.identifier.parse()?;
        let date = NaiveDate::parse_from_str(&req.date, "%Y-%m-%d")
            .map_err(|_| EventError::InvalidDate(req.date.clone()))?;
        Ok(Self {
            identifier,
            device_type,
            date,
            count: req.count,
            originator: originator.to_owned(),
        })
    }
}

/// Validates, attributes and counts events.
#[derive(Clone)]
pub struct EventLogger {
    authenticator: Arc<dyn Authenticator>,
    store: Arc<dyn EventStore>,
}

impl EventLogger {
    pub fn new(authenticator: Arc<dyn Authenticator>, store: Arc<dyn EventStore>) -> Self {
        Self {
            authenticator,
            store,
        }
    }

    /// Validate and count `req`, logging a warning if it cannot be recorded.
    ///
    /// # Errors
    ///
    /// Returns the [`EventError`] that was logged.
    pub async fn record(&self, req: &EventRequest, originator: &str) -> Result<u64, EventError> {
        let result = match Event::from_request(req, originator) {
            Ok(event) => self.save_event(&event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            self.log_failure(e, req, originator);
        }
        result
    }

    /// Add `event` to its daily bucket and return the bucket's new total.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Store`] if the backend fails.
    pub async fn save_event(&self, event: &Event) -> Result<u64, EventError> {
        let bucket = EventBucket {
            source: self.translate_token(&event.originator),
            identifier: event.identifier,
            device_type: event.device_type,
            date: event.date,
        };
        let total = self.store.add(bucket, event.count).await?;
        debug!(
            identifier = %event.identifier,
            device_type = %event.device_type,
            date = %event.date,
            total,
            "event recorded"
        );
        Ok(total)
    }

    fn log_failure(&self, err: &EventError, req: &EventRequest, originator: &str) {
        warn!(
            error = %err,
            identifier = %req.identifier,
            device_type = %req.device_type,
            date = %req.date,
            count = req.count,
            originator = %self.translate_token_for_logs(originator),
            "Unable to log event"
        );
    }

    /// Source an event from `token` is counted under: its region, or the raw
    /// token when the token has no real region.
    pub fn translate_token(&self, token: &str) -> String {
        match self.authenticator.authenticate(token) {
            Some(region) if region != UNMAPPED_REGION => region,
            _ => token.to_owned(),
        }
    }

    /// Log-safe form of `token`: its region, or only its first and last
    /// characters.
    pub fn translate_token_for_logs(&self, token: &str) -> String {
        match self.authenticator.authenticate(token) {
            Some(region) if region != UNMAPPED_REGION => region,
            _ => mask_token(token),
        }
    }
}

fn mask_token(token: &str) -> String {
    let mut chars = token.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) => format!("{first}...{last}"),
        (Some(first), None) => format!("{first}..."),
        _ => "...".to_owned(),
    }
}
