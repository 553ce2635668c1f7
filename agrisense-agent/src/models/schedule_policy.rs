use agrisense_api::ScheduleData;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, Time};

use crate::errors::ScheduleError;

/// Time-of-day window and interval gating autonomous collection.
///
/// Never mutated in place: an update builds a new policy that replaces the old
/// one as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    pub window_start: Time,
    pub window_end: Time,
    pub interval: Duration,
}

impl SchedulePolicy {
    pub fn new(window_start: Time, window_end: Time, interval: Duration) -> Result<Self, ScheduleError> {
        if interval < Duration::MINUTE {
            return Err(ScheduleError::ZeroInterval);
        }

        Ok(Self { window_start, window_end, interval })
    }

    pub fn from_data(data: &ScheduleData) -> Result<Self, ScheduleError> {
        Self::new(
            parse_time_of_day(&data.start_time)?,
            parse_time_of_day(&data.end_time)?,
            Duration::minutes(i64::from(data.interval_minutes)),
        )
    }

    pub fn to_data(&self) -> ScheduleData {
        ScheduleData {
            start_time: format_time_of_day(self.window_start),
            end_time: format_time_of_day(self.window_end),
            interval_minutes: u32::try_from(self.interval.whole_minutes()).unwrap_or(u32::MAX),
        }
    }

    /// Inclusive on both ends; a start after the end spans midnight.
    pub fn within_window(&self, t: Time) -> bool {
        if self.window_start <= self.window_end {
            self.window_start <= t && t <= self.window_end
        } else {
            t >= self.window_start || t <= self.window_end
        }
    }

    pub fn should_collect_now(&self, last_collection: OffsetDateTime, now: OffsetDateTime) -> bool {
        self.within_window(now.time()) && now - last_collection >= self.interval
    }
}

/// Parses "HH:MM" (one or two digit hour).
pub fn parse_time_of_day(value: &str) -> Result<Time, ScheduleError> {
    let invalid = || ScheduleError::InvalidTime(value.to_string());

    let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;
    if minute.len() != 2 {
        return Err(invalid());
    }

    let hour: u8 = hour.parse().map_err(|_| invalid())?;
    let minute: u8 = minute.parse().map_err(|_| invalid())?;

    Time::from_hms(hour, minute, 0).map_err(|_| invalid())
}

pub fn format_time_of_day(time: Time) -> String {
    time.format(format_description!("[hour]:[minute]"))
        .unwrap_or_else(|_| format!("{:02}:{:02}", time.hour(), time.minute()))
}
