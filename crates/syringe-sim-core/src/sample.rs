//! Tagged samples: the unit of data flowing through the stream.
//!
//! Every measurement is a [`Sample`] keyed by a [`TagId`]. Tags `tag-1`..`tag-5`
//! carry non-negative counts; `tag-0` carries a batch label. The value is a
//! sum type so a count can never be confused with a label.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data channel a sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TagId {
    /// `tag-0`: batch start marker, value is the batch name.
    BatchMarker,
    /// `tag-1`: flange defects in the interval.
    FlangeDefects,
    /// `tag-2`: glass defects in the interval.
    GlassDefects,
    /// `tag-3`: wall defects in the interval.
    WallDefects,
    /// `tag-4`: sum of tag-1..3 for the interval.
    TotalDefects,
    /// `tag-5`: syringes inspected in the interval.
    Inspected,
}

impl TagId {
    /// All tags in channel order.
    pub const ALL: [TagId; 6] = [
        TagId::BatchMarker,
        TagId::FlangeDefects,
        TagId::GlassDefects,
        TagId::WallDefects,
        TagId::TotalDefects,
        TagId::Inspected,
    ];

    /// The three per-category defect channels.
    pub const DEFECT_CATEGORIES: [TagId; 3] =
        [TagId::FlangeDefects, TagId::GlassDefects, TagId::WallDefects];

    /// Channels that get a running-total projection.
    pub const CUMULATIVE: [TagId; 2] = [TagId::TotalDefects, TagId::Inspected];

    /// Wire name, e.g. `"tag-4"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BatchMarker => "tag-0",
            Self::FlangeDefects => "tag-1",
            Self::GlassDefects => "tag-2",
            Self::WallDefects => "tag-3",
            Self::TotalDefects => "tag-4",
            Self::Inspected => "tag-5",
        }
    }

    /// Human-readable channel name for charts and tables.
    pub fn label(self) -> &'static str {
        match self {
            Self::BatchMarker => "Batch Marker",
            Self::FlangeDefects => "Flange Defect",
            Self::GlassDefects => "Glass Defect",
            Self::WallDefects => "Wall Defect",
            Self::TotalDefects => "Total Defects",
            Self::Inspected => "Inspected",
        }
    }

    /// Whether samples on this channel carry a count (everything but tag-0).
    pub fn is_numeric(self) -> bool {
        !matches!(self, Self::BatchMarker)
    }
}

impl std::fmt::Display for TagId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown tag name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tag '{0}' (expected tag-0 .. tag-5)")]
pub struct UnknownTag(pub String);

impl FromStr for TagId {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagId::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.as_str().to_string()
    }
}

impl TryFrom<String> for TagId {
    type Error = UnknownTag;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Value carried by a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Count(u64),
    Label(String),
}

impl SampleValue {
    /// The count, or `None` for a label.
    pub fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Count(_) => None,
            Self::Label(s) => Some(s),
        }
    }
}

impl std::fmt::Display for SampleValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Label(s) => f.write_str(s),
        }
    }
}

/// One timestamped, tagged measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub tag: TagId,
    pub value: SampleValue,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// A count sample on a numeric channel.
    pub fn count(tag: TagId, value: u64, timestamp: DateTime<Utc>) -> Self {
        debug_assert!(tag.is_numeric(), "{tag} does not carry counts");
        Self {
            tag,
            value: SampleValue::Count(value),
            timestamp,
        }
    }

    /// A `tag-0` batch start marker.
    pub fn batch_marker(name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            tag: TagId::BatchMarker,
            value: SampleValue::Label(name.into()),
            timestamp,
        }
    }

    /// Count value, `None` for batch markers.
    pub fn count_value(&self) -> Option<u64> {
        self.value.as_count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
