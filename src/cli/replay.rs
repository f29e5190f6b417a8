//! Offline replay of JSON-lines measurement logs through the configured views.

use crate::core::config::{Config, RecorderMode};
use crate::core::{ManualClock, Result, StatsError, TagKey, TagMap, TagValue, Timestamp};
use crate::stats::{Attachments, Measure, MeasureKind, MeasureMap, StatsManager, ViewData};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One line of a replay log.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplayRecord {
    pub timestamp_ms: i64,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub measurements: BTreeMap<String, serde_json::Number>,
    #[serde(default)]
    pub attachments: Attachments,
}

impl ReplayRecord {
    fn tag_map(&self) -> Result<TagMap> {
        self.tags
            .iter()
            .map(|(key, value)| -> Result<(TagKey, TagValue)> {
                Ok((TagKey::new(key.as_str())?, TagValue::new(value.as_str())?))
            })
            .collect()
    }

    fn measure_map(&self, measures: &HashMap<String, Measure>) -> MeasureMap {
        let mut map = self
            .attachments
            .iter()
            .fold(MeasureMap::new(), |map, (key, value)| {
                map.put_attachment(key.as_str(), value.as_str())
            });
        for (name, number) in &self.measurements {
            let Some(measure) = measures.get(name) else {
                debug!(measure = %name, "Skipping measure with no configured view");
                continue;
            };
            map = match (measure.kind(), number.as_i64(), number.as_f64()) {
                (MeasureKind::Long, Some(value), _) => map.put(measure, value),
                (_, _, Some(value)) => map.put(measure, value),
                _ => {
                    warn!(measure = %name, %number, "Skipping unrepresentable value");
                    map
                },
            };
        }
        map
    }
}

/// Parses every non-blank line of `input` as a [`ReplayRecord`].
pub fn read_records<R: BufRead>(input: R) -> Result<Vec<ReplayRecord>> {
    let mut records = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            warn!(line = index + 1, "Malformed replay record");
            StatsError::Serialization(e)
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Replays `records` through the views of `config` and snapshots every view
/// at `at_ms`, or at the last record's time when `at_ms` is unset.
///
/// Views are registered at the first record's time. Records are applied
/// synchronously in file order under a manual clock. A query time before the
/// first record is rejected.
pub fn replay(config: &Config, records: &[ReplayRecord], at_ms: Option<i64>) -> Result<Vec<ViewData>> {
    let start_ms = records
        .first()
        .map(|r| r.timestamp_ms)
        .or(at_ms)
        .unwrap_or_default();
    let end_ms = at_ms
        .or_else(|| records.last().map(|r| r.timestamp_ms))
        .unwrap_or(start_ms);
    if end_ms < start_ms {
        return Err(StatsError::config(format!(
            "query time {} ms is before the first record at {} ms",
            end_ms, start_ms
        )));
    }

    let clock = Arc::new(ManualClock::new(Timestamp::from_millis(start_ms)));
    let mut direct = config.clone();
    direct.recorder.mode = RecorderMode::Direct;
    let manager = StatsManager::from_config(&direct, clock.clone())?;

    let measures: HashMap<String, Measure> = config
        .views
        .iter()
        .map(|view| -> Result<(String, Measure)> {
            let measure = view.measure.to_measure()?;
            Ok((measure.name().to_string(), measure))
        })
        .collect::<Result<_>>()?;

    for record in records {
        let timestamp = Timestamp::from_millis(record.timestamp_ms);
        clock.set(timestamp);
        manager.record_at(&record.tag_map()?, record.measure_map(&measures), timestamp)?;
    }
    info!(records = records.len(), "Replayed records");

    clock.set(Timestamp::from_millis(end_ms));
    manager
        .registered_views()
        .iter()
        .map(|view| manager.get_view(view.name()))
        .collect()
}
