//! Summary metrics shown alongside the charts.

use serde::{Deserialize, Serialize};

use crate::sample::TagId;
use crate::store::Snapshot;

/// The four headline numbers of a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    /// Latest `tag-5` running total.
    pub total_inspected: u64,
    /// Latest `tag-4` running total.
    pub total_defects: u64,
    /// `100 * total_defects / total_inspected`; `None` before anything is inspected.
    pub defect_rate: Option<f64>,
    /// Name of the batch currently being reported.
    pub batch_name: String,
}

impl SummaryMetrics {
    /// Compute metrics from a snapshot.
    ///
    /// The batch name is the label of the newest `tag-0` marker in the log,
    /// falling back to `configured_batch` before the first start.
    pub fn from_snapshot(snapshot: &Snapshot, configured_batch: &str) -> Self {
        let total_inspected = snapshot.cumulative.latest_total(TagId::Inspected);
        let total_defects = snapshot.cumulative.latest_total(TagId::TotalDefects);
        let batch_name = snapshot
            .latest(TagId::BatchMarker)
            .and_then(|s| s.value.as_label())
            .unwrap_or(configured_batch)
            .to_string();

        Self {
            total_inspected,
            total_defects,
            defect_rate: defect_rate(total_defects, total_inspected),
            batch_name,
        }
    }

    /// Defect rate formatted like `"3.20%"`, or `"—"` when undefined.
    pub fn defect_rate_display(&self) -> String {
        match self.defect_rate {
            Some(rate) => format!("{rate:.2}%"),
            None => "—".to_string(),
        }
    }
}

/// Percentage of inspected items that were defective. `None` when nothing was inspected.
pub fn defect_rate(total_defects: u64, total_inspected: u64) -> Option<f64> {
    if total_inspected == 0 {
        return None;
    }
    Some(100.0 * total_defects as f64 / total_inspected as f64)
}
