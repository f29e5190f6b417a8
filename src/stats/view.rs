//! View definitions: what to aggregate, grouped by which tags, over which window.

use crate::core::error::{Result, StatsError};
use crate::core::types::{is_valid_name, TagKey, MAX_NAME_LENGTH};
use crate::stats::measure::Measure;
use crate::stats::view_data::INTERVAL_BUCKETS;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

/// Unique name of a view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViewName(String);

impl ViewName {
    /// Creates a new ViewName after validation
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(StatsError::invalid_name(format!(
                "View name must be printable ASCII of at most {} characters: {:?}",
                MAX_NAME_LENGTH, name
            )));
        }
        Ok(ViewName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ViewName {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self> {
        ViewName::new(value)
    }
}

impl From<ViewName> for String {
    fn from(name: ViewName) -> Self {
        name.0
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strictly increasing, finite histogram boundaries.
///
/// `B` boundaries define `B + 1` buckets: `(-inf, b0)`, `[b0, b1)`, ...,
/// `[b(B-1), +inf)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct BucketBoundaries(Vec<f64>);

impl BucketBoundaries {
    pub fn new(boundaries: Vec<f64>) -> Result<Self> {
        if let Some(bad) = boundaries.iter().find(|b| !b.is_finite()) {
            return Err(StatsError::InvalidBucketBoundaries(format!(
                "boundaries must be finite, got {}",
                bad
            )));
        }
        if boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(StatsError::InvalidBucketBoundaries(format!(
                "boundaries must be strictly increasing: {:?}",
                boundaries
            )));
        }
        Ok(BucketBoundaries(boundaries))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Number of buckets, one more than the number of boundaries
    pub fn bucket_count(&self) -> usize {
        self.0.len() + 1
    }

    /// Index of the first bucket whose upper boundary is above `value`.
    pub fn bucket_index(&self, value: f64) -> usize {
        self.0
            .iter()
            .position(|&boundary| value < boundary)
            .unwrap_or(self.0.len())
    }
}

impl TryFrom<Vec<f64>> for BucketBoundaries {
    type Error = StatsError;

    fn try_from(value: Vec<f64>) -> Result<Self> {
        BucketBoundaries::new(value)
    }
}

impl From<BucketBoundaries> for Vec<f64> {
    fn from(boundaries: BucketBoundaries) -> Self {
        boundaries.0
    }
}

/// How recorded values are summarized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Aggregation {
    Sum,
    Count,
    Mean,
    Distribution { boundaries: BucketBoundaries },
    LastValue,
}

impl Aggregation {
    pub fn distribution(boundaries: Vec<f64>) -> Result<Self> {
        Ok(Aggregation::Distribution {
            boundaries: BucketBoundaries::new(boundaries)?,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Count => "count",
            Aggregation::Mean => "mean",
            Aggregation::Distribution { .. } => "distribution",
            Aggregation::LastValue => "last_value",
        }
    }
}

/// Time range a view aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// Everything since registration (or since collection was resumed).
    Cumulative,
    /// The trailing `duration`, approximated by rotating buckets.
    Interval(#[serde(with = "humantime_serde")] Duration),
}

/// Immutable aggregation recipe over one measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    name: ViewName,
    description: String,
    measure: Measure,
    aggregation: Aggregation,
    columns: Vec<TagKey>,
    window: Window,
}

impl View {
    pub fn new<S: Into<String>>(
        name: ViewName,
        description: S,
        measure: Measure,
        aggregation: Aggregation,
        columns: Vec<TagKey>,
        window: Window,
    ) -> Result<Self> {
        let distinct: HashSet<&TagKey> = columns.iter().collect();
        if distinct.len() != columns.len() {
            return Err(StatsError::invalid_view(format!(
                "view {} has duplicate columns",
                name
            )));
        }
        if let Window::Interval(duration) = window {
            // Each of the N buckets must span at least one nanosecond.
            if duration.as_nanos() < INTERVAL_BUCKETS as u128 {
                return Err(StatsError::invalid_view(format!(
                    "interval of view {} must be positive, got {:?}",
                    name, duration
                )));
            }
        }
        Ok(View {
            name,
            description: description.into(),
            measure,
            aggregation,
            columns,
            window,
        })
    }

    pub fn name(&self) -> &ViewName {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }

    pub fn columns(&self) -> &[TagKey] {
        &self.columns
    }

    pub fn window(&self) -> Window {
        self.window
    }
}
