//! Stats aggregation and view engine.
//!
//! Measurements recorded through [`StatsManager`] are routed by measure name
//! to every registered [`View`], grouped by the view's tag columns and
//! aggregated over a cumulative or sliding interval window.

pub mod aggregation;
pub mod interval_bucket;
pub mod manager;
pub mod measure;
pub mod registry;
pub mod view;
pub mod view_data;

pub use aggregation::{AggregationData, DistributionData, Exemplar, MutableAggregation};
pub use manager::{CollectionState, StatsManager};
pub use measure::{Attachments, Measure, MeasureKind, MeasureMap, MeasureValue, Measurement};
pub use registry::MeasureToViewMap;
pub use view::{Aggregation, BucketBoundaries, View, ViewName, Window};
pub use view_data::{MutableViewData, ViewData, WindowData, INTERVAL_BUCKETS};
