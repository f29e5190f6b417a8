//! Core types, errors, clocks and configuration for viewstats.
//!
//! Everything the stats engine builds on that is not itself aggregation
//! logic lives here.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigBuilder};
pub use error::{Result, StatsError};
pub use types::{TagKey, TagMap, TagValue, TagValues, Timestamp};
