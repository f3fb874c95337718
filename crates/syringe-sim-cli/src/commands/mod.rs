pub mod monitor;
pub mod server;
pub mod stream;

use std::time::Duration;

use clap::Args;
use syringe_sim_core::StreamConfig;
use syringe_sim_core::config::{
    DEFAULT_BATCH_NAME, DEFAULT_INSPECTIONS, DEFAULT_STREAM_SPEED_SECS, DEFECT_RATE_RANGE,
    DefectRates,
};

/// Stream configuration flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Batch name recorded as the tag-0 marker on each start
    #[arg(long, default_value = DEFAULT_BATCH_NAME)]
    pub batch: String,

    /// Seconds between intervals (1-10)
    #[arg(long, default_value_t = DEFAULT_STREAM_SPEED_SECS, value_parser = clap::value_parser!(u64).range(1..=10))]
    pub speed: u64,

    /// Flange defect rate in percent (0-5)
    #[arg(long, default_value_t = DefectRates::default().flange, value_parser = parse_rate)]
    pub rate_flange: f64,

    /// Glass defect rate in percent (0-5)
    #[arg(long, default_value_t = DefectRates::default().glass, value_parser = parse_rate)]
    pub rate_glass: f64,

    /// Wall defect rate in percent (0-5)
    #[arg(long, default_value_t = DefectRates::default().wall, value_parser = parse_rate)]
    pub rate_wall: f64,

    /// Syringes inspected per interval (100-1000)
    #[arg(long, default_value_t = DEFAULT_INSPECTIONS, value_parser = clap::value_parser!(u32).range(100..=1000))]
    pub inspections: u32,
}

impl ConfigArgs {
    pub fn into_config(self) -> StreamConfig {
        StreamConfig {
            batch_name: self.batch,
            stream_speed_secs: self.speed,
            rates: DefectRates {
                flange: self.rate_flange,
                glass: self.rate_glass,
                wall: self.rate_wall,
            },
            inspections_per_interval: self.inspections,
        }
        .clamped()
    }
}

/// Parse a defect-rate percentage, rejecting values outside 0-5.
pub fn parse_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s
        .trim()
        .trim_end_matches('%')
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if DEFECT_RATE_RANGE.contains(&rate) {
        Ok(rate)
    } else {
        Err(format!(
            "{rate} is outside {}-{}",
            DEFECT_RATE_RANGE.start(),
            DEFECT_RATE_RANGE.end()
        ))
    }
}

/// Parse a duration string like "5m", "30s", "1h", "100ms". Bare numbers are seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {s}"))?;
    Ok(Duration::from_millis(value.saturating_mul(multiplier)))
}

/// Install env_logger. `RUST_LOG` overrides `default_filter`.
pub fn init_logging(default_filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .init();
}

/// Multi-threaded runtime hosting the stream controller.
pub fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    // -----------------------------------------------------------------------
    // parse_rate tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_rate_accepts_bounds_and_percent() {
        assert_eq!(parse_rate("0"), Ok(0.0));
        assert_eq!(parse_rate("5"), Ok(5.0));
        assert_eq!(parse_rate("1.5%"), Ok(1.5));
    }

    #[test]
    fn test_parse_rate_rejects_out_of_range() {
        assert!(parse_rate("5.1").is_err());
        assert!(parse_rate("-0.1").is_err());
        assert!(parse_rate("abc").is_err());
        assert!(parse_rate("NaN").is_err());
    }

    // -----------------------------------------------------------------------
    // parse_duration tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("100ms"), Ok(Duration::from_millis(100)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Ok(Duration::from_secs(3600)));
        assert_eq!(parse_duration("12"), Ok(Duration::from_secs(12)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("").is_err());
    }

    // -----------------------------------------------------------------------
    // ConfigArgs tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_config_args_defaults_match_stream_config() {
        let cli = TestCli::try_parse_from(["test"]).unwrap();
        assert_eq!(cli.config.into_config(), StreamConfig::default());
    }

    #[test]
    fn test_config_args_overrides() {
        let cli = TestCli::try_parse_from([
            "test",
            "--batch",
            "Lot-9",
            "--speed",
            "2",
            "--rate-glass",
            "0.4",
            "--inspections",
            "1000",
        ])
        .unwrap();
        let cfg = cli.config.into_config();
        assert_eq!(cfg.batch_name, "Lot-9");
        assert_eq!(cfg.stream_speed_secs, 2);
        assert_eq!(cfg.rates.glass, 0.4);
        assert_eq!(cfg.inspections_per_interval, 1000);
    }

    #[test]
    fn test_config_args_range_checks() {
        assert!(TestCli::try_parse_from(["test", "--speed", "0"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--speed", "11"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--inspections", "99"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--rate-wall", "7"]).is_err());
    }
}
