use std::fmt;

use serde::{Deserialize, Serialize};

/// Which physical sensor a channel or record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorRole {
    Soil,
    Environmental,
}

impl SensorRole {
    pub const ALL: [SensorRole; 2] = [SensorRole::Soil, SensorRole::Environmental];

    /// Query byte sent to the device, also the `command` form field on upload.
    pub fn command(&self) -> &'static str {
        match self {
            SensorRole::Soil => "A",
            SensorRole::Environmental => "B",
        }
    }

    /// Soil uploads feed image analysis downstream and must carry a photo.
    pub fn requires_artifact(&self) -> bool {
        matches!(self, SensorRole::Soil)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorRole::Soil => "soil",
            SensorRole::Environmental => "environmental",
        }
    }
}

impl fmt::Display for SensorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
