//! # syringe-sim-core
//!
//! Stream engine for a simulated syringe inspection line.
//!
//! Every interval the line reports three per-category defect counts (flange,
//! glass, wall), their total, and how many syringes were inspected. This crate
//! generates those intervals with a little noise, keeps them in an append-only
//! log, and maintains running totals for dashboards.
//!
//! ## Quick Start
//!
//! ```no_run
//! use syringe_sim_core::{StreamConfig, StreamController};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let controller = StreamController::spawn(StreamConfig::default());
//! let mut updates = controller.subscribe();
//!
//! controller.start();
//! updates.changed().await.unwrap();
//!
//! let metrics = controller.metrics();
//! println!("{} inspected, {} defects", metrics.total_inspected, metrics.total_defects);
//! controller.stop();
//! # }
//! ```
//!
//! ## Architecture
//!
//! Controller (tick) → [`SampleGenerator`] → [`SampleStore::append`] →
//! [`SampleStore::recompute_cumulative`] → subscribers read a [`Snapshot`]
//!
//! Tags:
//! - `tag-0`: batch marker (label), written once per start
//! - `tag-1`..`tag-3`: flange / glass / wall defects per interval
//! - `tag-4`: total defects per interval (sum of tag-1..3)
//! - `tag-5`: syringes inspected per interval

pub mod config;
pub mod controller;
pub mod export;
pub mod generator;
pub mod metrics;
pub mod sample;
pub mod store;

pub use config::{ConfigError, DefectRates, StreamConfig};
pub use controller::{SessionState, StreamController, StreamState};
pub use export::{
    DEFAULT_EXPORT_PATH, ExportError, ExportFormat, ExportSummary, export_samples,
};
pub use generator::{NoiseSource, SampleGenerator, UniformNoise, ZeroNoise};
pub use metrics::{SummaryMetrics, defect_rate};
pub use sample::{Sample, SampleValue, TagId, UnknownTag};
pub use store::{CumulativePoint, CumulativeView, SampleStore, Snapshot};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
