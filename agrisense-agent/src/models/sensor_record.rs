use serde::{Deserialize, Serialize};

use crate::models::SensorRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilReadings {
    /// Electrical conductivity
    pub ec: f64,
    pub ph: f64,
    pub salt: f64,
    /// Nitrogen
    pub n: f64,
    /// Phosphorus
    pub p: f64,
    /// Potassium
    pub k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalReadings {
    /// Formaldehyde
    pub ch2o: f64,
    /// Total volatile organic compounds
    pub tvoc: f64,
    pub pm25: f64,
    pub pm10: f64,
    pub co2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Readings {
    Soil(SoilReadings),
    Environmental(EnvironmentalReadings),
}

/// One successful sensor read. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    /// Bus address reported by the device
    pub address: u32,
    /// Temperature after calibration, in Celsius
    pub temperature: f64,
    /// Relative humidity after calibration, in percent
    pub humidity: f64,
    pub readings: Readings,
    /// Line as received, kept for diagnostics
    pub raw_line: String,
}

impl SensorRecord {
    pub fn role(&self) -> SensorRole {
        match self.readings {
            Readings::Soil(_) => SensorRole::Soil,
            Readings::Environmental(_) => SensorRole::Environmental,
        }
    }

    /// Role specific values in upload order, keyed by their form field name.
    pub fn fields(&self) -> Vec<(&'static str, f64)> {
        match &self.readings {
            Readings::Soil(soil) => vec![
                ("ec", soil.ec),
                ("ph", soil.ph),
                ("salt", soil.salt),
                ("n", soil.n),
                ("p", soil.p),
                ("k", soil.k),
            ],
            Readings::Environmental(env) => vec![
                ("ch2o", env.ch2o),
                ("tvoc", env.tvoc),
                ("pm25", env.pm25),
                ("pm10", env.pm10),
                ("co2", env.co2),
            ],
        }
    }
}
