//! Append-only sample log with a derived running-total view.
//!
//! The log and the cumulative view are held behind `Arc`s. [`SampleStore::snapshot`]
//! hands out cheap clones of both; a later [`SampleStore::append`] copies the log
//! only if a reader still holds the previous version, so a snapshot never
//! observes a write in progress.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sample::{Sample, TagId};

/// One point of a running total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativePoint {
    pub timestamp: DateTime<Utc>,
    pub total: u64,
}

/// Running totals for the `tag-4` and `tag-5` channels, in log order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativeView {
    pub total_defects: Vec<CumulativePoint>,
    pub inspected: Vec<CumulativePoint>,
}

impl CumulativeView {
    /// Prefix sums over `log` for every tag in [`TagId::CUMULATIVE`].
    pub fn from_log(log: &[Sample]) -> Self {
        Self {
            total_defects: prefix_sums(log, TagId::TotalDefects),
            inspected: prefix_sums(log, TagId::Inspected),
        }
    }

    /// Running-total series for `tag`; empty for tags without a projection.
    pub fn series(&self, tag: TagId) -> &[CumulativePoint] {
        match tag {
            TagId::TotalDefects => &self.total_defects,
            TagId::Inspected => &self.inspected,
            _ => &[],
        }
    }

    /// Latest running total for `tag`, 0 when the series is empty.
    pub fn latest_total(&self, tag: TagId) -> u64 {
        self.series(tag).last().map_or(0, |p| p.total)
    }

    pub fn is_empty(&self) -> bool {
        self.total_defects.is_empty() && self.inspected.is_empty()
    }
}

fn prefix_sums(log: &[Sample], tag: TagId) -> Vec<CumulativePoint> {
    let mut total = 0u64;
    log.iter()
        .filter(|s| s.tag == tag)
        .filter_map(|s| {
            let n = s.count_value()?;
            total = total.saturating_add(n);
            Some(CumulativePoint {
                timestamp: s.timestamp,
                total,
            })
        })
        .collect()
}

/// Read-only, consistent view of the store at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub log: Arc<Vec<Sample>>,
    pub cumulative: Arc<CumulativeView>,
}

impl Snapshot {
    /// Most recent sample on `tag`.
    pub fn latest(&self, tag: TagId) -> Option<&Sample> {
        self.log.iter().rev().find(|s| s.tag == tag)
    }

    /// All samples on `tag`, in log order.
    pub fn series(&self, tag: TagId) -> impl Iterator<Item = &Sample> {
        self.log.iter().filter(move |s| s.tag == tag)
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

/// Owner of the sample log. Single writer; any number of snapshot readers.
#[derive(Debug, Default)]
pub struct SampleStore {
    log: Arc<Vec<Sample>>,
    cumulative: Arc<CumulativeView>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append samples in the given order. No deduplication.
    pub fn append<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        Arc::make_mut(&mut self.log).extend(samples);
    }

    /// Rebuild the running totals from the full log and return them.
    pub fn recompute_cumulative(&mut self) -> Arc<CumulativeView> {
        self.cumulative = Arc::new(CumulativeView::from_log(&self.log));
        Arc::clone(&self.cumulative)
    }

    /// Running totals as of the last [`recompute_cumulative`](Self::recompute_cumulative).
    pub fn cumulative(&self) -> &CumulativeView {
        &self.cumulative
    }

    /// Most recently appended sample on `tag`.
    pub fn latest(&self, tag: TagId) -> Option<&Sample> {
        self.log.iter().rev().find(|s| s.tag == tag)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            log: Arc::clone(&self.log),
            cumulative: Arc::clone(&self.cumulative),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
