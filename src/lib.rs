//! viewstats - in-process stats aggregation.
//!
//! viewstats turns a stream of tagged numeric measurements into queryable
//! aggregated statistics. Each registered view keeps a running sum, count,
//! mean, distribution or last value per combination of tag values, over
//! either everything since registration or a sliding interval.
//!
//! # Architecture
//!
//! - `core`: timestamps, tags, clocks, errors, configuration and logging
//! - `stats`: measures, views, accumulators, the registry and the manager
//! - `cli`: the `viewstats` binary's check and replay commands
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use viewstats::core::{ManualClock, TagKey, TagMap, TagValue, Timestamp};
//! use viewstats::stats::{
//!     Aggregation, AggregationData, Measure, MeasureMap, StatsManager, View, ViewName, Window,
//! };
//!
//! # fn main() -> viewstats::Result<()> {
//! let clock = Arc::new(ManualClock::new(Timestamp::from_secs(30)));
//! let manager = StatsManager::direct(clock)?;
//!
//! let latency = Measure::double("latency", "Request latency", "ms")?;
//! let method = TagKey::new("method")?;
//! let view = View::new(
//!     ViewName::new("latency_by_method")?,
//!     "Mean latency per method",
//!     latency.clone(),
//!     Aggregation::Mean,
//!     vec![method.clone()],
//!     Window::Cumulative,
//! )?;
//! manager.register_view(view.clone())?;
//!
//! let tags = TagMap::new().with(method, TagValue::new("GET")?);
//! manager.record(&tags, MeasureMap::new().put(&latency, 10.0))?;
//! manager.record(&tags, MeasureMap::new().put(&latency, 30.0))?;
//!
//! let data = manager.get_view(view.name())?;
//! assert_eq!(
//!     data.get(&[Some("GET")]),
//!     Some(&AggregationData::Mean { mean: 20.0, count: 2 })
//! );
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod cli;
pub mod core;
pub mod stats;

// Re-export core types for convenience
pub use crate::core::{Config, Result, StatsError};
pub use crate::stats::StatsManager;
