use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Agent connected, also the reply to a `status` command.
    Online,
    /// A collection cycle started.
    Collecting,
    /// A collection cycle uploaded successfully.
    Collected,
    /// A collection cycle failed.
    Error,
    /// The schedule was replaced by a push update.
    ScheduleUpdated,
    /// Agent shutting down, also used as the broker last will.
    Offline,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Collecting => "collecting",
            Status::Collected => "collected",
            Status::Error => "error",
            Status::ScheduleUpdated => "schedule_updated",
            Status::Offline => "offline",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound message on the farm status topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub farm_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Map<String, Value>>,
}

impl StatusMessage {
    pub fn new(status: Status, farm_id: &str, details: Option<Map<String, Value>>) -> Self {
        Self {
            status: status.to_string(),
            timestamp: OffsetDateTime::now_utc(),
            farm_id: farm_id.to_string(),
            details,
        }
    }
}
