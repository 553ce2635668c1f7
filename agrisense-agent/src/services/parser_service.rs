use crate::configs::Sensors;
use crate::errors::ParseError;
use crate::models::{EnvironmentalReadings, Readings, SensorRecord, SensorRole, SoilReadings};

/// Number of comma separated fields in every sensor reply.
pub const FIELD_COUNT: usize = 9;

/// Divisors applied to the raw temperature and humidity fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub temperature: f64,
    pub humidity: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            humidity: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameParser {
    soil: Calibration,
    environmental: Calibration,
}

impl FrameParser {
    pub fn new(soil: Calibration, environmental: Calibration) -> Self {
        Self { soil, environmental }
    }

    pub fn from_settings(sensors: &Sensors) -> Self {
        let calibration = |role| {
            let channel = sensors.channel(role);
            Calibration {
                temperature: channel.temperature_scale,
                humidity: channel.humidity_scale,
            }
        };

        Self::new(calibration(SensorRole::Soil), calibration(SensorRole::Environmental))
    }

    pub fn calibration(&self, role: SensorRole) -> Calibration {
        match role {
            SensorRole::Soil => self.soil,
            SensorRole::Environmental => self.environmental,
        }
    }

    /// Decodes `address,temperature,humidity,...` into a record for `role`.
    pub fn parse(&self, role: SensorRole, line: &str) -> Result<SensorRecord, ParseError> {
        if line.trim().is_empty() {
            return Err(ParseError::new("empty line", line));
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != FIELD_COUNT {
            return Err(ParseError::new(
                format!("expected {FIELD_COUNT} fields, got {}", fields.len()),
                line,
            ));
        }

        let mut values = [0f64; FIELD_COUNT];
        for (i, field) in fields.iter().enumerate() {
            values[i] = match field.parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                _ => {
                    return Err(ParseError::new(
                        format!("field {} is not numeric: '{}'", i + 1, field),
                        line,
                    ));
                }
            };
        }

        if values[0] < 0.0 || values[0].fract() != 0.0 || values[0] > f64::from(u32::MAX) {
            return Err(ParseError::new(format!("bad address '{}'", fields[0]), line));
        }

        let calibration = self.calibration(role);
        let [_, _, _, v3, v4, v5, v6, v7, v8] = values;

        let readings = match role {
            SensorRole::Soil => Readings::Soil(SoilReadings {
                ec: v3,
                ph: v4,
                salt: v5,
                n: v6,
                p: v7,
                k: v8,
            }),
            // the ninth field is a fixed trailer
            SensorRole::Environmental => Readings::Environmental(EnvironmentalReadings {
                ch2o: v3,
                tvoc: v4,
                pm25: v5,
                pm10: v6,
                co2: v7,
            }),
        };

        let record = SensorRecord {
            address: values[0] as u32,
            temperature: values[1] / calibration.temperature,
            humidity: values[2] / calibration.humidity,
            readings,
            raw_line: line.to_string(),
        };

        check_ranges(&record);

        Ok(record)
    }
}

/// Logs values no real sensor reports. Never rejects the record.
fn check_ranges(record: &SensorRecord) {
    let role = record.role();

    if !(-40.0..=80.0).contains(&record.temperature) {
        tracing::warn!(%role, "Temperature out of range: {}", record.temperature);
    }
    if !(0.0..=100.0).contains(&record.humidity) {
        tracing::warn!(%role, "Humidity out of range: {}", record.humidity);
    }
    if let Readings::Soil(soil) = &record.readings {
        if !(0.0..=14.0).contains(&soil.ph) {
            tracing::warn!(%role, "pH out of range: {}", soil.ph);
        }
    }
    for (name, value) in record.fields() {
        if value < 0.0 {
            tracing::warn!(%role, "Negative {}: {}", name, value);
        }
    }
}
