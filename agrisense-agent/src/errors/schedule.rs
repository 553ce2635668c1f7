#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Interval must be at least one minute")]
    ZeroInterval,

    #[error("Schedule lookup failed: HTTP {0}")]
    Status(u16),

    #[error("Schedule lookup failed: {0}")]
    Request(#[from] reqwest::Error),
}
