use std::env;
use std::time::Duration;

use agrisense_api::ScheduleData;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use time::UtcOffset;

use crate::configs::normalize_path;
use crate::models::{SchedulePolicy, SensorRole};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logger {
    pub level: String,
    pub file: Option<LogFile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFile {
    pub path: String,
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_keep_lines")]
    pub keep_lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Commands typed on stdin.
    Interactive,
    /// Schedule poll loop only.
    Autonomous,
    /// Remote commands and schedule pushes alongside the poll loop.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub farm_id: String,
    pub organization_id: String,
    pub mode: Mode,
    #[serde(default = "default_collect_all_pause_ms")]
    pub collect_all_pause_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Resolver {
    /// Fixed device paths per role.
    Static {
        soil: Option<String>,
        environmental: Option<String>,
    },
    /// USB vendor/product ids per role, with a generic fallback list.
    Vendor {
        soil: Option<UsbId>,
        environmental: Option<UsbId>,
        #[serde(default)]
        generic: Vec<UsbId>,
    },
    /// Query every adapter sharing one id and keep the ones that answer.
    Probe { usb_id: UsbId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default)]
    pub settle_delay_ms: u64,
    #[serde(default)]
    pub pre_read_delay_ms: u64,
    #[serde(default = "default_scale")]
    pub temperature_scale: f64,
    #[serde(default = "default_scale")]
    pub humidity_scale: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sensors {
    pub resolver: Resolver,
    pub soil: Channel,
    pub environmental: Channel,
}

impl Sensors {
    pub fn channel(&self, role: SensorRole) -> &Channel {
        match role {
            SensorRole::Soil => &self.soil,
            SensorRole::Environmental => &self.environmental,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Artifact {
    /// Copy a fixed image for every cycle.
    Canned { source: String, directory: String },
    /// Run an external capture program; `{path}` in args is the output file.
    Capture {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        directory: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ingestion {
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_upload_timeout_secs")]
    pub timeout_secs: u64,
    pub schedule_url: Option<String>,
    #[serde(default = "default_schedule_timeout_secs")]
    pub schedule_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub start_time: String,
    pub end_time: String,
    pub interval_minutes: u32,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    pub utc_offset_minutes: Option<i32>,
}

impl Schedule {
    pub fn data(&self) -> ScheduleData {
        ScheduleData {
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            interval_minutes: self.interval_minutes,
        }
    }

    /// Fixed offset when configured, otherwise the host's, otherwise UTC.
    pub fn utc_offset(&self) -> UtcOffset {
        match self.utc_offset_minutes {
            Some(minutes) => UtcOffset::from_whole_seconds(minutes.saturating_mul(60)).unwrap_or(UtcOffset::UTC),
            None => UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }

    /// Replaces an unset offset with the host's current one.
    pub fn pin_utc_offset(&mut self) {
        if self.utc_offset_minutes.is_none() {
            self.utc_offset_minutes = match UtcOffset::current_local_offset() {
                Ok(offset) => Some(i32::from(offset.whole_minutes())),
                Err(_) => {
                    eprintln!("Local UTC offset unavailable, schedule runs on UTC");
                    Some(0)
                }
            };
        }
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remote {
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    pub auth: Option<RemoteAuth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub logger: Logger,
    pub agent: Agent,
    pub sensors: Sensors,
    pub artifact: Artifact,
    pub ingestion: Ingestion,
    pub schedule: Schedule,
    pub remote: Option<Remote>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or("development".into());

        let mut settings: Settings = Config::builder()
            .add_source(File::with_name("configs/default"))
            .add_source(File::with_name(&format!("configs/{run_mode}")).required(false))
            .add_source(Environment::with_prefix("AGENT").separator("__").try_parsing(true))
            .set_override_option("ingestion.api_key", env::var("SENSOR_API_KEY").ok())?
            .build()?
            .try_deserialize()?;

        settings.validate().map_err(ConfigError::Message)?;

        if let Some(file) = &mut settings.logger.file {
            file.path = normalize_path(&file.path)
                .map_err(|e| ConfigError::Message(e.to_string()))?
                .to_string_lossy()
                .to_string();
        }

        settings.artifact = match settings.artifact {
            Artifact::Canned { source, directory } => Artifact::Canned {
                source: normalize(&source)?,
                directory: normalize(&directory)?,
            },
            Artifact::Capture { program, args, directory } => Artifact::Capture {
                program,
                args,
                directory: normalize(&directory)?,
            },
        };

        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        for role in SensorRole::ALL {
            let channel = self.sensors.channel(role);
            if !(channel.temperature_scale > 0.0 && channel.humidity_scale > 0.0) {
                return Err(format!("{role} scale factors must be greater than zero"));
            }
        }

        SchedulePolicy::from_data(&self.schedule.data()).map_err(|e| e.to_string())?;

        if let Some(file) = &self.logger.file {
            if file.keep_lines == 0 || file.keep_lines > file.max_lines {
                return Err("logger.file.keep_lines must be between 1 and max_lines".into());
            }
        }

        Ok(())
    }

    pub fn client_id(&self) -> String {
        self.remote
            .as_ref()
            .and_then(|remote| remote.client_id.clone())
            .unwrap_or_else(|| format!("sensor-{}", self.agent.farm_id))
    }
}

fn normalize(path: &str) -> Result<String, ConfigError> {
    Ok(normalize_path(path)
        .map_err(|e| ConfigError::Message(e.to_string()))?
        .to_string_lossy()
        .to_string())
}

fn default_max_lines() -> usize {
    5000
}

fn default_keep_lines() -> usize {
    3000
}

fn default_collect_all_pause_ms() -> u64 {
    1000
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_scale() -> f64 {
    1.0
}

fn default_upload_timeout_secs() -> u64 {
    30
}

fn default_schedule_timeout_secs() -> u64 {
    10
}

fn default_poll_secs() -> u64 {
    30
}

fn default_keep_alive_secs() -> u64 {
    30
}
