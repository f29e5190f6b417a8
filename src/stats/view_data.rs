//! Mutable per-view state and the immutable [`ViewData`] snapshots it produces.
//!
//! A cumulative view keeps one accumulator per tag tuple since it was
//! registered. An interval view keeps `INTERVAL_BUCKETS + 1` rotating buckets
//! and approximates a sliding window by linearly decaying the oldest one.

use crate::core::error::{Result, StatsError};
use crate::core::types::{duration_to_nanos, TagMap, TagValue, TagValues, Timestamp};
use crate::stats::aggregation::{AggregationData, MutableAggregation};
use crate::stats::interval_bucket::IntervalBucket;
use crate::stats::manager::CollectionState;
use crate::stats::measure::Attachments;
use crate::stats::view::{View, Window};
use ahash::AHashMap;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// Number of buckets an interval window is divided into. One extra bucket is
/// kept so the window can decay the oldest one.
pub const INTERVAL_BUCKETS: usize = 4;

/// Time range covered by a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WindowData {
    Cumulative { start: Timestamp, end: Timestamp },
    Interval { end: Timestamp },
}

/// Immutable snapshot of one view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewData {
    pub view: View,
    #[serde(rename = "rows", serialize_with = "serialize_rows")]
    pub aggregation_map: BTreeMap<TagValues, AggregationData>,
    pub window: WindowData,
}

impl ViewData {
    /// Looks up the row for `tag_values`, given as plain optional strings.
    pub fn get(&self, tag_values: &[Option<&str>]) -> Option<&AggregationData> {
        self.aggregation_map
            .iter()
            .find(|(key, _)| {
                key.len() == tag_values.len()
                    && key
                        .iter()
                        .zip(tag_values)
                        .all(|(k, v)| k.as_ref().map(TagValue::as_str) == *v)
            })
            .map(|(_, data)| data)
    }
}

#[derive(Serialize)]
struct Row<'a> {
    tags: &'a TagValues,
    data: &'a AggregationData,
}

fn serialize_rows<S: Serializer>(
    map: &BTreeMap<TagValues, AggregationData>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(map.len()))?;
    for (tags, data) in map {
        seq.serialize_element(&Row { tags, data })?;
    }
    seq.end()
}

fn to_data_map(
    aggregations: &AHashMap<TagValues, MutableAggregation>,
) -> BTreeMap<TagValues, AggregationData> {
    aggregations
        .iter()
        .map(|(tags, aggregation)| (tags.clone(), aggregation.to_data()))
        .collect()
}

/// Accumulated state of one registered view.
#[derive(Debug, Clone)]
pub enum MutableViewData {
    Cumulative(CumulativeViewData),
    Interval(IntervalViewData),
}

impl MutableViewData {
    /// Creates empty state for `view`, with its window starting at `now`.
    pub fn new(view: View, now: Timestamp) -> Result<Self> {
        match view.window() {
            Window::Cumulative => Ok(MutableViewData::Cumulative(CumulativeViewData::new(
                view, now,
            ))),
            Window::Interval(duration) => Ok(MutableViewData::Interval(IntervalViewData::new(
                view, duration, now,
            )?)),
        }
    }

    pub fn view(&self) -> &View {
        match self {
            MutableViewData::Cumulative(data) => &data.view,
            MutableViewData::Interval(data) => &data.view,
        }
    }

    pub fn record(
        &mut self,
        tags: &TagMap,
        value: f64,
        attachments: &Attachments,
        timestamp: Timestamp,
    ) -> Result<()> {
        match self {
            MutableViewData::Cumulative(data) => {
                data.record(tags, value, attachments, timestamp);
                Ok(())
            },
            MutableViewData::Interval(data) => data.record(tags, value, attachments, timestamp),
        }
    }

    pub fn snapshot(&mut self, now: Timestamp, state: CollectionState) -> Result<ViewData> {
        match self {
            MutableViewData::Cumulative(data) => Ok(data.snapshot(now, state)),
            MutableViewData::Interval(data) => data.snapshot(now, state),
        }
    }

    pub fn clear_stats(&mut self) {
        match self {
            MutableViewData::Cumulative(data) => data.aggregations.clear(),
            MutableViewData::Interval(data) => data.buckets.iter_mut().for_each(IntervalBucket::clear),
        }
    }

    /// Restarts collection at `now` after a disabled period.
    pub fn resume(&mut self, now: Timestamp) -> Result<()> {
        match self {
            MutableViewData::Cumulative(data) => {
                data.start = now;
                Ok(())
            },
            MutableViewData::Interval(data) => data.refresh(now),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CumulativeViewData {
    view: View,
    start: Timestamp,
    aggregations: AHashMap<TagValues, MutableAggregation>,
}

impl CumulativeViewData {
    fn new(view: View, start: Timestamp) -> Self {
        Self {
            view,
            start,
            aggregations: AHashMap::new(),
        }
    }

    fn record(
        &mut self,
        tags: &TagMap,
        value: f64,
        attachments: &Attachments,
        timestamp: Timestamp,
    ) {
        let tag_values = tags.tag_values(self.view.columns());
        let aggregation = self.view.aggregation();
        let kind = self.view.measure().kind();
        self.aggregations
            .entry(tag_values)
            .or_insert_with(|| MutableAggregation::new(aggregation, kind))
            .add(value, attachments, timestamp);
    }

    fn snapshot(&self, now: Timestamp, state: CollectionState) -> ViewData {
        match state {
            CollectionState::Enabled => ViewData {
                view: self.view.clone(),
                aggregation_map: to_data_map(&self.aggregations),
                window: WindowData::Cumulative {
                    start: self.start,
                    end: now,
                },
            },
            CollectionState::Disabled => ViewData {
                view: self.view.clone(),
                aggregation_map: BTreeMap::new(),
                window: WindowData::Cumulative {
                    start: Timestamp::ZERO,
                    end: Timestamp::ZERO,
                },
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntervalViewData {
    view: View,
    total_duration: Duration,
    bucket_duration: Duration,
    /// Oldest first. Always `INTERVAL_BUCKETS + 1` contiguous buckets.
    buckets: VecDeque<IntervalBucket>,
}

impl IntervalViewData {
    fn new(view: View, total_duration: Duration, now: Timestamp) -> Result<Self> {
        let bucket_nanos = duration_to_nanos(total_duration) / INTERVAL_BUCKETS as i64;
        if bucket_nanos <= 0 {
            return Err(StatsError::invalid_view(format!(
                "interval of view {} is too short: {:?}",
                view.name(),
                total_duration
            )));
        }
        let mut data = Self {
            view,
            total_duration,
            bucket_duration: Duration::from_nanos(bucket_nanos.unsigned_abs()),
            buckets: VecDeque::with_capacity(INTERVAL_BUCKETS + 1),
        };
        data.reseed(now)?;
        Ok(data)
    }

    /// Replaces every bucket with empty ones, the newest starting at `now`.
    fn reseed(&mut self, now: Timestamp) -> Result<()> {
        let mut buckets = VecDeque::with_capacity(INTERVAL_BUCKETS + 1);
        let mut start = now.sub_duration(self.total_duration);
        for _ in 0..=INTERVAL_BUCKETS {
            buckets.push_back(self.new_bucket(start)?);
            start = start.add_duration(self.bucket_duration);
        }
        self.buckets = buckets;
        Ok(())
    }

    fn new_bucket(&self, start: Timestamp) -> Result<IntervalBucket> {
        IntervalBucket::new(
            start,
            self.bucket_duration,
            self.view.aggregation(),
            self.view.measure().kind(),
        )
    }

    /// Rotates the bucket ring forward so the newest bucket covers `now`.
    fn refresh(&mut self, now: Timestamp) -> Result<()> {
        let last_start = match self.buckets.back() {
            Some(bucket) => bucket.start(),
            None => return self.reseed(now),
        };
        let elapsed = now
            .duration_since(last_start)
            .ok_or(StatsError::ClockWentBackwards {
                now,
                last_bucket_start: last_start,
            })?;
        let pad = elapsed.as_nanos() / self.bucket_duration.as_nanos();

        if pad > (INTERVAL_BUCKETS + 1) as u128 {
            debug!(
                view = %self.view.name(),
                %now,
                "Interval window fully expired, reseeding buckets"
            );
            return self.reseed(now);
        }

        let mut start = last_start;
        for _ in 0..pad {
            start = start.add_duration(self.bucket_duration);
            let bucket = self.new_bucket(start)?;
            self.buckets.push_back(bucket);
            self.buckets.pop_front();
        }
        Ok(())
    }

    fn record(
        &mut self,
        tags: &TagMap,
        value: f64,
        attachments: &Attachments,
        timestamp: Timestamp,
    ) -> Result<()> {
        let tag_values = tags.tag_values(self.view.columns());
        self.refresh(timestamp)?;
        if let Some(newest) = self.buckets.back_mut() {
            newest.record(tag_values, value, attachments, timestamp);
        }
        Ok(())
    }

    fn snapshot(&mut self, now: Timestamp, state: CollectionState) -> Result<ViewData> {
        self.refresh(now)?;
        let (aggregation_map, window) = match state {
            CollectionState::Enabled => (self.combine_buckets(now)?, WindowData::Interval { end: now }),
            CollectionState::Disabled => (
                BTreeMap::new(),
                WindowData::Interval {
                    end: Timestamp::ZERO,
                },
            ),
        };
        Ok(ViewData {
            view: self.view.clone(),
            aggregation_map,
            window,
        })
    }

    /// Merges all buckets per tag tuple. The oldest bucket contributes the
    /// share of its span not yet overlapped by the newest bucket.
    fn combine_buckets(&self, now: Timestamp) -> Result<BTreeMap<TagValues, AggregationData>> {
        let (Some(head), Some(tail)) = (self.buckets.front(), self.buckets.back()) else {
            return Ok(BTreeMap::new());
        };
        let fraction_tail = tail.fraction(now)?;
        let fraction_head = 1.0 - fraction_tail;

        let aggregation = self.view.aggregation();
        let kind = self.view.measure().kind();
        let mut combined: AHashMap<TagValues, MutableAggregation> = AHashMap::new();

        for (tag_values, bucket_aggregation) in head.aggregations() {
            let mut fractional = MutableAggregation::new(aggregation, kind);
            fractional.combine(bucket_aggregation, fraction_head)?;
            combined.insert(tag_values.clone(), fractional);
        }
        for bucket in self.buckets.iter().skip(1) {
            for (tag_values, bucket_aggregation) in bucket.aggregations() {
                combined
                    .entry(tag_values.clone())
                    .or_insert_with(|| MutableAggregation::new(aggregation, kind))
                    .combine(bucket_aggregation, 1.0)?;
            }
        }
        Ok(to_data_map(&combined))
    }

    #[cfg(test)]
    fn bucket_starts(&self) -> Vec<Timestamp> {
        self.buckets.iter().map(IntervalBucket::start).collect()
    }
}
