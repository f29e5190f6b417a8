use crate::core::error::{Result, StatsError};
use crate::core::types::{duration_to_nanos, TagValues, Timestamp};
use crate::stats::aggregation::MutableAggregation;
use crate::stats::measure::{Attachments, MeasureKind};
use crate::stats::view::Aggregation;
use ahash::AHashMap;
use std::time::Duration;

/// One fixed-span slice of an interval view.
///
/// Holds the accumulators for every tag tuple recorded while this bucket was
/// the newest one.
#[derive(Debug, Clone)]
pub struct IntervalBucket {
    start: Timestamp,
    duration: Duration,
    aggregation: Aggregation,
    kind: MeasureKind,
    aggregations: AHashMap<TagValues, MutableAggregation>,
}

impl IntervalBucket {
    pub fn new(
        start: Timestamp,
        duration: Duration,
        aggregation: &Aggregation,
        kind: MeasureKind,
    ) -> Result<Self> {
        if duration.is_zero() {
            return Err(StatsError::invalid_view("bucket duration must be positive"));
        }
        Ok(Self {
            start,
            duration,
            aggregation: aggregation.clone(),
            kind,
            aggregations: AHashMap::new(),
        })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn record(
        &mut self,
        tag_values: TagValues,
        value: f64,
        attachments: &Attachments,
        timestamp: Timestamp,
    ) {
        let aggregation = &self.aggregation;
        let kind = self.kind;
        self.aggregations
            .entry(tag_values)
            .or_insert_with(|| MutableAggregation::new(aggregation, kind))
            .add(value, attachments, timestamp);
    }

    /// Elapsed share of this bucket's span at `now`, in `[0, 1)`.
    pub fn fraction(&self, now: Timestamp) -> Result<f64> {
        let end = self.start.add_duration(self.duration);
        let elapsed = match now.duration_since(self.start) {
            Some(elapsed) if now < end => elapsed,
            _ => {
                return Err(StatsError::BucketNotCurrent {
                    now,
                    start: self.start,
                    end,
                })
            },
        };
        Ok(duration_to_nanos(elapsed) as f64 / duration_to_nanos(self.duration) as f64)
    }

    pub fn aggregations(&self) -> &AHashMap<TagValues, MutableAggregation> {
        &self.aggregations
    }

    pub fn clear(&mut self) {
        self.aggregations.clear();
    }
}
