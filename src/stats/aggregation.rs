//! Per-tag-tuple accumulators and their immutable snapshots.

use crate::core::error::{Result, StatsError};
use crate::core::types::Timestamp;
use crate::stats::measure::{Attachments, MeasureKind};
use crate::stats::view::{Aggregation, BucketBoundaries};
use serde::{Deserialize, Serialize};

/// Distributions only merge whole buckets; fractions further than this from
/// 1.0 are ignored.
const DISTRIBUTION_FRACTION_TOLERANCE: f64 = 1e-6;

/// Running accumulator for one tag tuple of one view.
#[derive(Debug, Clone, PartialEq)]
pub enum MutableAggregation {
    Sum { sum: f64, kind: MeasureKind },
    Count { count: i64 },
    Mean { sum: f64, count: i64 },
    Distribution(MutableDistribution),
    LastValue { value: Option<f64>, kind: MeasureKind },
}

impl MutableAggregation {
    /// Creates an empty accumulator for `aggregation` over a measure of `kind`.
    pub fn new(aggregation: &Aggregation, kind: MeasureKind) -> Self {
        match aggregation {
            Aggregation::Sum => MutableAggregation::Sum { sum: 0.0, kind },
            Aggregation::Count => MutableAggregation::Count { count: 0 },
            Aggregation::Mean => MutableAggregation::Mean { sum: 0.0, count: 0 },
            Aggregation::Distribution { boundaries } => {
                MutableAggregation::Distribution(MutableDistribution::new(boundaries.clone()))
            },
            Aggregation::LastValue => MutableAggregation::LastValue { value: None, kind },
        }
    }

    /// Adds one recorded value. `attachments` and `timestamp` only matter to
    /// distributions, which keep them as the bucket's exemplar.
    pub fn add(&mut self, value: f64, attachments: &Attachments, timestamp: Timestamp) {
        match self {
            MutableAggregation::Sum { sum, .. } => *sum += value,
            MutableAggregation::Count { count } => *count += 1,
            MutableAggregation::Mean { sum, count } => {
                *sum += value;
                *count += 1;
            },
            MutableAggregation::Distribution(distribution) => {
                distribution.add(value, attachments, timestamp)
            },
            MutableAggregation::LastValue { value: last, .. } => *last = Some(value),
        }
    }

    /// Adds `fraction` of `other` into this accumulator.
    ///
    /// Counts are rounded after scaling. Distributions ignore any fraction
    /// that is not 1.0.
    pub fn combine(&mut self, other: &MutableAggregation, fraction: f64) -> Result<()> {
        match (self, other) {
            (MutableAggregation::Sum { sum, .. }, MutableAggregation::Sum { sum: other, .. }) => {
                *sum += fraction * other;
            },
            (MutableAggregation::Count { count }, MutableAggregation::Count { count: other }) => {
                *count += scale_count(*other, fraction);
            },
            (
                MutableAggregation::Mean { sum, count },
                MutableAggregation::Mean {
                    sum: other_sum,
                    count: other_count,
                },
            ) => {
                *count += scale_count(*other_count, fraction);
                *sum += fraction * other_sum;
            },
            (MutableAggregation::Distribution(this), MutableAggregation::Distribution(other)) => {
                if (1.0 - fraction).abs() <= DISTRIBUTION_FRACTION_TOLERANCE {
                    this.merge(other)?;
                }
            },
            (
                MutableAggregation::LastValue { value, .. },
                MutableAggregation::LastValue { value: other, .. },
            ) => {
                if other.is_some() {
                    *value = *other;
                }
            },
            (this, other) => {
                return Err(StatsError::AggregationMismatch {
                    expected: this.kind_name(),
                    found: other.kind_name(),
                });
            },
        }
        Ok(())
    }

    /// Immutable snapshot of the current value.
    pub fn to_data(&self) -> AggregationData {
        match self {
            MutableAggregation::Sum {
                sum,
                kind: MeasureKind::Double,
            } => AggregationData::SumDouble(*sum),
            MutableAggregation::Sum {
                sum,
                kind: MeasureKind::Long,
            } => AggregationData::SumLong(sum.round() as i64),
            MutableAggregation::Count { count } => AggregationData::Count(*count),
            MutableAggregation::Mean { sum, count } => AggregationData::Mean {
                mean: if *count == 0 { 0.0 } else { sum / *count as f64 },
                count: *count,
            },
            MutableAggregation::Distribution(distribution) => {
                AggregationData::Distribution(distribution.to_data())
            },
            MutableAggregation::LastValue {
                value,
                kind: MeasureKind::Double,
            } => AggregationData::LastValueDouble(*value),
            MutableAggregation::LastValue {
                value,
                kind: MeasureKind::Long,
            } => AggregationData::LastValueLong(value.map(|v| v.round() as i64)),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            MutableAggregation::Sum { .. } => "sum",
            MutableAggregation::Count { .. } => "count",
            MutableAggregation::Mean { .. } => "mean",
            MutableAggregation::Distribution(_) => "distribution",
            MutableAggregation::LastValue { .. } => "last_value",
        }
    }
}

fn scale_count(count: i64, fraction: f64) -> i64 {
    (fraction * count as f64).round() as i64
}

/// A sample value kept for one histogram bucket, with the context it was
/// recorded in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exemplar {
    pub value: f64,
    pub timestamp: Timestamp,
    pub attachments: Attachments,
}

/// Histogram accumulator using Welford's online mean and variance.
#[derive(Debug, Clone, PartialEq)]
pub struct MutableDistribution {
    boundaries: BucketBoundaries,
    count: i64,
    mean: f64,
    sum_of_squared_deviations: f64,
    min: f64,
    max: f64,
    bucket_counts: Vec<i64>,
    /// Newest exemplar per bucket. Empty when there are no boundaries.
    exemplars: Vec<Option<Exemplar>>,
}

impl MutableDistribution {
    pub fn new(boundaries: BucketBoundaries) -> Self {
        let bucket_counts = vec![0; boundaries.bucket_count()];
        let exemplars = if boundaries.as_slice().is_empty() {
            Vec::new()
        } else {
            vec![None; boundaries.bucket_count()]
        };
        Self {
            boundaries,
            count: 0,
            mean: 0.0,
            sum_of_squared_deviations: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            bucket_counts,
            exemplars,
        }
    }

    /// Records `value`. A non-empty `attachments` replaces the exemplar of
    /// the value's bucket.
    pub fn add(&mut self, value: f64, attachments: &Attachments, timestamp: Timestamp) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta_after = value - self.mean;
        self.sum_of_squared_deviations += delta * delta_after;

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let index = self.boundaries.bucket_index(value);
        self.bucket_counts[index] += 1;

        if attachments.is_empty() {
            return;
        }
        if let Some(slot) = self.exemplars.get_mut(index) {
            *slot = Some(Exemplar {
                value,
                timestamp,
                attachments: attachments.clone(),
            });
        }
    }

    /// Parallel merge of two running distributions (Chan et al.).
    ///
    /// `other` is taken to be the newer one: its exemplars replace ours.
    fn merge(&mut self, other: &MutableDistribution) -> Result<()> {
        if self.boundaries != other.boundaries {
            return Err(StatsError::InvalidBucketBoundaries(format!(
                "cannot merge distributions over {:?} and {:?}",
                self.boundaries.as_slice(),
                other.boundaries.as_slice()
            )));
        }
        if other.count == 0 {
            return Ok(());
        }

        let combined_count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.sum_of_squared_deviations += other.sum_of_squared_deviations
            + delta * delta * (self.count as f64 * other.count as f64 / combined_count as f64);
        self.mean += delta * (other.count as f64 / combined_count as f64);
        self.count = combined_count;

        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        for (bucket, other_bucket) in self.bucket_counts.iter_mut().zip(&other.bucket_counts) {
            *bucket += other_bucket;
        }
        for (slot, other_exemplar) in self.exemplars.iter_mut().zip(&other.exemplars) {
            if other_exemplar.is_some() {
                slot.clone_from(other_exemplar);
            }
        }
        Ok(())
    }

    fn to_data(&self) -> DistributionData {
        DistributionData {
            mean: self.mean,
            count: self.count,
            min: self.min,
            max: self.max,
            sum_of_squared_deviations: self.sum_of_squared_deviations,
            bucket_counts: self.bucket_counts.clone(),
            exemplars: self.exemplars.iter().flatten().cloned().collect(),
        }
    }
}

/// Snapshot of a distribution accumulator.
///
/// An empty distribution reports `min = +inf` and `max = -inf`. Exemplars
/// are listed in bucket order, at most one per bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionData {
    pub mean: f64,
    pub count: i64,
    pub min: f64,
    pub max: f64,
    pub sum_of_squared_deviations: f64,
    pub bucket_counts: Vec<i64>,
    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
}

/// Immutable value of one tag tuple in a view snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationData {
    SumDouble(f64),
    SumLong(i64),
    Count(i64),
    Mean { mean: f64, count: i64 },
    Distribution(DistributionData),
    LastValueDouble(Option<f64>),
    LastValueLong(Option<i64>),
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    fn boundaries() -> Aggregation {
        Aggregation::distribution(vec![-10.0, 0.0, 10.0]).unwrap()
    }

    fn filled(aggregation: &Aggregation, values: &[f64]) -> MutableAggregation {
        let mut mutable = MutableAggregation::new(aggregation, MeasureKind::Double);
        for value in values {
            mutable.add(*value, &Attachments::new(), Timestamp::ZERO);
        }
        mutable
    }

    fn attachments(trace_id: &str) -> Attachments {
        Attachments::from([("trace_id".to_string(), trace_id.to_string())])
    }

    fn distribution(values: &[f64]) -> DistributionData {
        match filled(&boundaries(), values).to_data() {
            AggregationData::Distribution(data) => data,
            other => panic!("expected distribution, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_aggregations() {
        let sum = MutableAggregation::new(&Aggregation::Sum, MeasureKind::Double);
        assert_eq!(sum.to_data(), AggregationData::SumDouble(0.0));

        let mean = MutableAggregation::new(&Aggregation::Mean, MeasureKind::Double);
        assert_eq!(mean.to_data(), AggregationData::Mean { mean: 0.0, count: 0 });

        let last = MutableAggregation::new(&Aggregation::LastValue, MeasureKind::Long);
        assert_eq!(last.to_data(), AggregationData::LastValueLong(None));

        let data = distribution(&[]);
        assert_eq!(data.count, 0);
        assert!(data.min.is_infinite() && data.min > 0.0);
        assert!(data.max.is_infinite() && data.max < 0.0);
        assert_eq!(data.bucket_counts, vec![0, 0, 0, 0]);
        assert!(data.exemplars.is_empty());
    }

    #[test]
    fn test_mean_and_count() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(
            filled(&Aggregation::Mean, &values).to_data(),
            AggregationData::Mean { mean: 25.0, count: 4 }
        );
        assert_eq!(
            filled(&Aggregation::Count, &[-1.0, 0.0, 1e9]).to_data(),
            AggregationData::Count(3)
        );
    }

    #[test]
    fn test_distribution_buckets() {
        let data = distribution(&[-1.0, 1.0, -5.0, 20.0, 5.0]);
        assert_eq!(data.bucket_counts, vec![0, 2, 2, 1]);
        assert_eq!(data.count, 5);
        assert!((data.mean - 4.0).abs() < TOLERANCE);
        assert_eq!(data.min, -5.0);
        assert_eq!(data.max, 20.0);
        assert!((data.sum_of_squared_deviations - 372.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_long_values_round_on_snapshot() {
        let mut sum = MutableAggregation::new(&Aggregation::Sum, MeasureKind::Long);
        sum.add(2.0, &Attachments::new(), Timestamp::ZERO);
        sum.combine(&filled(&Aggregation::Sum, &[5.0]), 0.3).unwrap();
        assert_eq!(sum.to_data(), AggregationData::SumLong(4));

        let mut last = MutableAggregation::new(&Aggregation::LastValue, MeasureKind::Long);
        last.add(7.0, &Attachments::new(), Timestamp::ZERO);
        assert_eq!(last.to_data(), AggregationData::LastValueLong(Some(7)));
    }

    #[test]
    fn test_combine_sum_count_mean_scales_by_fraction() {
        for aggregation in [Aggregation::Sum, Aggregation::Count, Aggregation::Mean] {
            let first = filled(&aggregation, &[-1.0, -5.0]);
            let second = filled(&aggregation, &[10.0, 50.0]);
            let mut combined = MutableAggregation::new(&aggregation, MeasureKind::Double);
            combined.combine(&first, 1.0).unwrap();
            combined.combine(&second, 0.6).unwrap();

            match combined.to_data() {
                AggregationData::SumDouble(sum) => assert!((sum - 30.0).abs() < TOLERANCE),
                AggregationData::Count(count) => assert_eq!(count, 3),
                AggregationData::Mean { mean, count } => {
                    assert!((mean - 10.0).abs() < TOLERANCE);
                    assert_eq!(count, 3);
                },
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_combine_distribution_merges_whole_buckets_only() {
        let first = filled(&boundaries(), &[5.0, -5.0]);
        let second = filled(&boundaries(), &[10.0, 20.0]);
        let third = filled(&boundaries(), &[-10.0, 15.0, -15.0, -20.0]);

        let mut combined = MutableAggregation::new(&boundaries(), MeasureKind::Double);
        combined.combine(&first, 1.0).unwrap();
        combined.combine(&second, 0.6).unwrap();
        fn expect(
            combined: &MutableAggregation,
            mean: f64,
            count: i64,
            min: f64,
            max: f64,
            ssd: f64,
            buckets: Vec<i64>,
        ) {
            let AggregationData::Distribution(data) = combined.to_data() else {
                panic!("expected distribution");
            };
            assert!((data.mean - mean).abs() < TOLERANCE);
            assert_eq!(data.count, count);
            assert_eq!(data.min, min);
            assert_eq!(data.max, max);
            assert!((data.sum_of_squared_deviations - ssd).abs() < TOLERANCE);
            assert_eq!(data.bucket_counts, buckets);
        }
        expect(&combined, 0.0, 2, -5.0, 5.0, 50.0, vec![0, 1, 1, 0]);

        combined.combine(&second, 1.0).unwrap();
        expect(&combined, 7.5, 4, -5.0, 20.0, 325.0, vec![0, 1, 1, 2]);

        combined.combine(&third, 1.0).unwrap();
        expect(&combined, 0.0, 8, -20.0, 20.0, 1500.0, vec![2, 2, 1, 3]);
    }

    #[test]
    fn test_distribution_keeps_newest_exemplar_per_bucket() {
        let mut mutable = MutableAggregation::new(&boundaries(), MeasureKind::Double);
        mutable.add(1.0, &attachments("a"), Timestamp::from_secs(1));
        mutable.add(2.0, &attachments("b"), Timestamp::from_secs(2));
        mutable.add(-5.0, &Attachments::new(), Timestamp::from_secs(3));
        mutable.add(20.0, &attachments("c"), Timestamp::from_secs(4));

        let AggregationData::Distribution(data) = mutable.to_data() else {
            panic!("expected distribution");
        };
        assert_eq!(data.bucket_counts, vec![0, 1, 2, 1]);
        assert_eq!(
            data.exemplars,
            vec![
                Exemplar {
                    value: 2.0,
                    timestamp: Timestamp::from_secs(2),
                    attachments: attachments("b"),
                },
                Exemplar {
                    value: 20.0,
                    timestamp: Timestamp::from_secs(4),
                    attachments: attachments("c"),
                },
            ]
        );
    }

    #[test]
    fn test_distribution_without_boundaries_has_no_exemplars() {
        let aggregation = Aggregation::distribution(vec![]).unwrap();
        let mut mutable = MutableAggregation::new(&aggregation, MeasureKind::Double);
        mutable.add(1.0, &attachments("a"), Timestamp::from_secs(1));

        let AggregationData::Distribution(data) = mutable.to_data() else {
            panic!("expected distribution");
        };
        assert_eq!(data.count, 1);
        assert!(data.exemplars.is_empty());
    }

    #[test]
    fn test_combine_distribution_prefers_newer_exemplars() {
        let mut older = MutableAggregation::new(&boundaries(), MeasureKind::Double);
        older.add(1.0, &attachments("old"), Timestamp::from_secs(1));
        older.add(-15.0, &attachments("only_old"), Timestamp::from_secs(1));
        let mut newer = MutableAggregation::new(&boundaries(), MeasureKind::Double);
        newer.add(5.0, &attachments("new"), Timestamp::from_secs(2));

        let mut combined = MutableAggregation::new(&boundaries(), MeasureKind::Double);
        combined.combine(&older, 1.0).unwrap();
        combined.combine(&newer, 1.0).unwrap();

        let AggregationData::Distribution(data) = combined.to_data() else {
            panic!("expected distribution");
        };
        let kept: Vec<(f64, &str)> = data
            .exemplars
            .iter()
            .map(|e| (e.value, e.attachments["trace_id"].as_str()))
            .collect();
        assert_eq!(kept, vec![(-15.0, "only_old"), (5.0, "new")]);
    }

    #[test]
    fn test_combine_last_value_keeps_latest_set_value() {
        let mut combined = MutableAggregation::new(&Aggregation::LastValue, MeasureKind::Double);
        combined.combine(&filled(&Aggregation::LastValue, &[1.0, 3.0]), 1.0).unwrap();
        combined.combine(&filled(&Aggregation::LastValue, &[]), 1.0).unwrap();
        assert_eq!(combined.to_data(), AggregationData::LastValueDouble(Some(3.0)));
    }

    #[test]
    fn test_combine_mismatched_kinds() {
        let mut sum = MutableAggregation::new(&Aggregation::Sum, MeasureKind::Double);
        let count = MutableAggregation::new(&Aggregation::Count, MeasureKind::Double);
        let err = sum.combine(&count, 1.0).unwrap_err();
        assert!(matches!(
            err,
            StatsError::AggregationMismatch {
                expected: "sum",
                found: "count"
            }
        ));
    }
}
