use crate::errors::ScheduleError;

/// Conditions that stop the agent at startup.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No sensor channel could be opened")]
    NoChannels,

    #[error("Remote mode requires a [remote] section")]
    MissingRemote,

    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Failed to read console input: {0}")]
    Console(#[from] std::io::Error),
}
