use crate::core::error::{Result, StatsError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Maximum length of names, tag keys and tag values.
pub const MAX_NAME_LENGTH: usize = 255;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;

/// Point in time, in nanoseconds since the Unix epoch.
///
/// Signed, because interval views seed buckets one full window before the
/// registration time, which can fall before the epoch under a fake clock.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The zero timestamp, used for the window of a disabled view.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Creates a timestamp from whole seconds plus nanoseconds
    pub fn new(seconds: i64, nanos: u32) -> Self {
        Timestamp(
            seconds
                .saturating_mul(NANOS_PER_SECOND)
                .saturating_add(i64::from(nanos)),
        )
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Timestamp(nanos)
    }

    pub fn from_millis(millis: i64) -> Self {
        Timestamp(millis.saturating_mul(NANOS_PER_MILLI))
    }

    pub fn from_secs(seconds: i64) -> Self {
        Timestamp(seconds.saturating_mul(NANOS_PER_SECOND))
    }

    /// Converts a wall-clock time; times before the epoch become negative.
    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(after) => Timestamp(duration_to_nanos(after)),
            Err(before) => Timestamp(-duration_to_nanos(before.duration())),
        }
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn add_duration(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration_to_nanos(duration)))
    }

    #[must_use]
    pub fn sub_duration(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration_to_nanos(duration)))
    }

    /// Time elapsed since `earlier`, or `None` if `earlier` is later than `self`.
    pub fn duration_since(self, earlier: Timestamp) -> Option<Duration> {
        let delta = self.0.checked_sub(earlier.0)?;
        u64::try_from(delta).ok().map(Duration::from_nanos)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.div_euclid(NANOS_PER_SECOND);
        let nanos = self.0.rem_euclid(NANOS_PER_SECOND);
        write!(f, "{}.{:09}s", secs, nanos)
    }
}

pub(crate) fn duration_to_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

/// Printable ASCII, at most [`MAX_NAME_LENGTH`] characters.
pub(crate) fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && name.bytes().all(|b| (b' '..=b'~').contains(&b))
}

/// Key of a tag; one column of a view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagKey(String);

/// Value of a tag.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagValue(String);

impl TagKey {
    /// Creates a new TagKey after validation
    pub fn new<S: Into<String>>(key: S) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(StatsError::invalid_name("TagKey cannot be empty"));
        }
        if !is_valid_name(&key) {
            return Err(StatsError::invalid_name(format!(
                "TagKey must be printable ASCII of at most {} characters: {:?}",
                MAX_NAME_LENGTH, key
            )));
        }
        Ok(TagKey(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TagValue {
    /// Creates a new TagValue after validation. Empty values are allowed.
    pub fn new<S: Into<String>>(value: S) -> Result<Self> {
        let value = value.into();
        if !is_valid_name(&value) {
            return Err(StatsError::invalid_name(format!(
                "TagValue must be printable ASCII of at most {} characters: {:?}",
                MAX_NAME_LENGTH, value
            )));
        }
        Ok(TagValue(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TagKey {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self> {
        TagKey::new(value)
    }
}

impl TryFrom<String> for TagValue {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self> {
        TagValue::new(value)
    }
}

impl From<TagKey> for String {
    fn from(key: TagKey) -> Self {
        key.0
    }
}

impl From<TagValue> for String {
    fn from(value: TagValue) -> Self {
        value.0
    }
}

impl fmt::Display for TagKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tag values of one aggregation row, in view column order.
///
/// `None` marks a column that the recorded tags did not set.
pub type TagValues = Vec<Option<TagValue>>;

/// Immutable set of tags attached to a recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    tags: BTreeMap<TagKey, TagValue>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this map with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: TagKey, value: TagValue) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn get(&self, key: &TagKey) -> Option<&TagValue> {
        self.tags.get(key)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TagKey, &TagValue)> {
        self.tags.iter()
    }

    /// Projects these tags onto `columns`, filling unset columns with `None`.
    pub fn tag_values(&self, columns: &[TagKey]) -> TagValues {
        columns.iter().map(|key| self.tags.get(key).cloned()).collect()
    }
}

impl FromIterator<(TagKey, TagValue)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (TagKey, TagValue)>>(iter: I) -> Self {
        TagMap {
            tags: iter.into_iter().collect(),
        }
    }
}
