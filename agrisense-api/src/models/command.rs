use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Inbound message on the farm command topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    /// Requested action name, see [`Action`].
    pub action: String,
    /// Correlation id chosen by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Farm the command is addressed to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_id: Option<String>,
    /// Sender timestamp, passed through as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl RemoteCommand {
    pub fn new(action: Action) -> Self {
        Self {
            action: action.to_string(),
            request_id: None,
            farm_id: None,
            timestamp: None,
        }
    }

    /// Recognized action, `None` for names this agent does not handle.
    pub fn action(&self) -> Option<Action> {
        self.action.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Collect and upload the soil sensor with its photo.
    CollectSoil,
    /// Collect and upload the environmental sensor.
    CollectEnv,
    /// Soil first, then environmental.
    CollectAll,
    /// Report connectivity and the active schedule.
    Status,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CollectSoil => "collect_soil",
            Action::CollectEnv => "collect_env",
            Action::CollectAll => "collect_all",
            Action::Status => "status",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown action: {}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "collect_soil" => Ok(Action::CollectSoil),
            "collect_env" => Ok(Action::CollectEnv),
            "collect_all" => Ok(Action::CollectAll),
            "status" => Ok(Action::Status),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}
