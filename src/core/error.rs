use crate::core::types::Timestamp;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("A different view with the same name is already registered: {0}")]
    ViewConflict(String),

    #[error("A different measure with the same name is already registered: {0}")]
    MeasureConflict(String),

    #[error("View not found: {0}")]
    ViewNotFound(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid view definition: {0}")]
    InvalidView(String),

    #[error("Invalid bucket boundaries: {0}")]
    InvalidBucketBoundaries(String),

    #[error("Aggregation mismatch: expected {expected}, found {found}")]
    AggregationMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Current time {now} is before the start of the last bucket {last_bucket_start}")]
    ClockWentBackwards {
        now: Timestamp,
        last_bucket_start: Timestamp,
    },

    #[error("Bucket must be current: {now} is outside [{start}, {end})")]
    BucketNotCurrent {
        now: Timestamp,
        start: Timestamp,
        end: Timestamp,
    },

    #[error("State was already read, cannot set state")]
    StateAlreadyRead,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Channel send error")]
    ChannelSend,

    #[error("Channel receive error")]
    ChannelReceive,
}

/// Result type alias for stats operations
pub type Result<T> = std::result::Result<T, StatsError>;

impl StatsError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new invalid view error
    pub fn invalid_view<S: Into<String>>(msg: S) -> Self {
        Self::InvalidView(msg.into())
    }

    /// Creates a new invalid name error
    pub fn invalid_name<S: Into<String>>(msg: S) -> Self {
        Self::InvalidName(msg.into())
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Every registry operation is synchronous and in-memory, so only the
    /// record queue can fail transiently.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ChannelSend | Self::ChannelReceive)
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::ViewConflict(_) | Self::MeasureConflict(_) => "conflict",
            Self::ViewNotFound(_) => "not_found",
            Self::InvalidName(_) | Self::InvalidView(_) | Self::InvalidBucketBoundaries(_) => {
                "validation"
            },
            Self::AggregationMismatch { .. } => "aggregation",
            Self::ClockWentBackwards { .. } | Self::BucketNotCurrent { .. } => "clock",
            Self::StateAlreadyRead => "state",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
            Self::ChannelSend | Self::ChannelReceive => "channel",
        }
    }
}
