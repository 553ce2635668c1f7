use serde::{Deserialize, Serialize};

/// Collection schedule as exchanged with the server.
///
/// Used both for push updates on the organization schedule topic and for
/// reporting the active schedule in status messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleData {
    /// Window start, "HH:MM"
    pub start_time: String,
    /// Window end, "HH:MM"; may be earlier than the start to span midnight
    pub end_time: String,
    /// Minimum minutes between autonomous collections
    pub interval_minutes: u32,
}

/// Body returned by the schedule lookup endpoint. Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleResponse {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub interval_minutes: Option<u32>,
}

impl ScheduleResponse {
    /// Fills the absent fields from `current`.
    pub fn merge_into(self, current: &ScheduleData) -> ScheduleData {
        ScheduleData {
            start_time: self.start_time.unwrap_or_else(|| current.start_time.clone()),
            end_time: self.end_time.unwrap_or_else(|| current.end_time.clone()),
            interval_minutes: self.interval_minutes.unwrap_or(current.interval_minutes),
        }
    }
}
