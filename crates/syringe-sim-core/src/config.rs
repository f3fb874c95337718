//! Stream configuration: batch name, tick speed, defect rates, inspection volume.
//!
//! The controller assumes a validated configuration. Front-ends either reject
//! out-of-range input with [`StreamConfig::validate`] or pull it back into
//! range with [`StreamConfig::clamped`].

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Allowed stream speed in seconds between intervals.
pub const STREAM_SPEED_RANGE: RangeInclusive<u64> = 1..=10;
/// Allowed per-category defect rate, in percent.
pub const DEFECT_RATE_RANGE: RangeInclusive<f64> = 0.0..=5.0;
/// Allowed inspections per interval.
pub const INSPECTIONS_RANGE: RangeInclusive<u32> = 100..=1000;

pub const DEFAULT_BATCH_NAME: &str = "Batch-1";
pub const DEFAULT_STREAM_SPEED_SECS: u64 = 5;
pub const DEFAULT_INSPECTIONS: u32 = 500;

/// Per-category defect rates in percent of inspected syringes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefectRates {
    /// tag-1 rate.
    pub flange: f64,
    /// tag-2 rate.
    pub glass: f64,
    /// tag-3 rate.
    pub wall: f64,
}

impl Default for DefectRates {
    fn default() -> Self {
        Self {
            flange: 1.0,
            glass: 1.5,
            wall: 0.8,
        }
    }
}

impl DefectRates {
    /// Rates in tag order (tag-1, tag-2, tag-3).
    pub fn as_array(&self) -> [f64; 3] {
        [self.flange, self.glass, self.wall]
    }
}

/// Everything a stream tick reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub batch_name: String,
    pub stream_speed_secs: u64,
    pub rates: DefectRates,
    pub inspections_per_interval: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_name: DEFAULT_BATCH_NAME.to_string(),
            stream_speed_secs: DEFAULT_STREAM_SPEED_SECS,
            rates: DefectRates::default(),
            inspections_per_interval: DEFAULT_INSPECTIONS,
        }
    }
}

/// A configuration field outside its allowed range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("batch name must not be empty")]
    EmptyBatchName,
}

impl StreamConfig {
    /// Delay between intervals.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.stream_speed_secs)
    }

    /// Check every field against its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_name.trim().is_empty() {
            return Err(ConfigError::EmptyBatchName);
        }
        check_range(
            "stream_speed_secs",
            self.stream_speed_secs as f64,
            *STREAM_SPEED_RANGE.start() as f64,
            *STREAM_SPEED_RANGE.end() as f64,
        )?;
        for (field, rate) in [
            ("rates.flange", self.rates.flange),
            ("rates.glass", self.rates.glass),
            ("rates.wall", self.rates.wall),
        ] {
            check_range(
                field,
                rate,
                *DEFECT_RATE_RANGE.start(),
                *DEFECT_RATE_RANGE.end(),
            )?;
        }
        check_range(
            "inspections_per_interval",
            self.inspections_per_interval as f64,
            *INSPECTIONS_RANGE.start() as f64,
            *INSPECTIONS_RANGE.end() as f64,
        )
    }

    /// Pull every numeric field into range. NaN rates become 0.
    pub fn clamped(mut self) -> Self {
        self.stream_speed_secs = self
            .stream_speed_secs
            .clamp(*STREAM_SPEED_RANGE.start(), *STREAM_SPEED_RANGE.end());
        self.inspections_per_interval = self
            .inspections_per_interval
            .clamp(*INSPECTIONS_RANGE.start(), *INSPECTIONS_RANGE.end());
        for rate in [
            &mut self.rates.flange,
            &mut self.rates.glass,
            &mut self.rates.wall,
        ] {
            *rate = clamp_rate(*rate);
        }
        if self.batch_name.trim().is_empty() {
            self.batch_name = DEFAULT_BATCH_NAME.to_string();
        }
        self
    }
}

/// Clamp a rate into [`DEFECT_RATE_RANGE`].
pub fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return *DEFECT_RATE_RANGE.start();
    }
    rate.clamp(*DEFECT_RATE_RANGE.start(), *DEFECT_RATE_RANGE.end())
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = StreamConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.batch_name, "Batch-1");
        assert_eq!(cfg.period(), Duration::from_secs(5));
        assert_eq!(cfg.rates.as_array(), [1.0, 1.5, 0.8]);
    }

    #[test]
    fn test_validate_rejects_each_bound() {
        let cfg = StreamConfig {
            stream_speed_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { field: "stream_speed_secs", .. })
        ));

        let cfg = StreamConfig {
            inspections_per_interval: 1001,
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { field: "inspections_per_interval", .. })
        ));

        let mut cfg = StreamConfig::default();
        cfg.rates.glass = 5.01;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { field: "rates.glass", .. })
        ));

        let mut cfg = StreamConfig::default();
        cfg.rates.wall = f64::NAN;
        assert!(cfg.validate().is_err());

        let cfg = StreamConfig {
            batch_name: "  ".into(),
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::EmptyBatchName));
    }

    #[test]
    fn test_validate_accepts_inclusive_bounds() {
        let cfg = StreamConfig {
            batch_name: "edge".into(),
            stream_speed_secs: 10,
            rates: DefectRates {
                flange: 0.0,
                glass: 5.0,
                wall: 5.0,
            },
            inspections_per_interval: 100,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_clamped_pulls_into_range() {
        let cfg = StreamConfig {
            batch_name: String::new(),
            stream_speed_secs: 60,
            rates: DefectRates {
                flange: -1.0,
                glass: 9.0,
                wall: f64::NAN,
            },
            inspections_per_interval: 5,
        }
        .clamped();
        assert_eq!(cfg.stream_speed_secs, 10);
        assert_eq!(cfg.inspections_per_interval, 100);
        assert_eq!(cfg.rates.as_array(), [0.0, 5.0, 0.0]);
        assert_eq!(cfg.batch_name, DEFAULT_BATCH_NAME);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: StreamConfig = serde_json::from_str(r#"{"batch_name":"Lot-9"}"#).unwrap();
        assert_eq!(cfg.batch_name, "Lot-9");
        assert_eq!(cfg.inspections_per_interval, DEFAULT_INSPECTIONS);
    }
}
