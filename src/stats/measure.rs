//! Measures and the per-recording measurement batch.

use crate::core::error::{Result, StatsError};
use crate::core::types::{is_valid_name, MAX_NAME_LENGTH};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric type of a measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureKind {
    Double,
    Long,
}

/// Named, typed definition of a quantity being measured.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measure {
    name: String,
    description: String,
    unit: String,
    kind: MeasureKind,
}

impl Measure {
    /// Creates a new measure after validating its name
    pub fn new<S: Into<String>>(name: S, description: S, unit: S, kind: MeasureKind) -> Result<Self> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(StatsError::invalid_name(format!(
                "Measure name must be printable ASCII of at most {} characters: {:?}",
                MAX_NAME_LENGTH, name
            )));
        }
        Ok(Measure {
            name,
            description: description.into(),
            unit: unit.into(),
            kind,
        })
    }

    pub fn double<S: Into<String>>(name: S, description: S, unit: S) -> Result<Self> {
        Self::new(name, description, unit, MeasureKind::Double)
    }

    pub fn long<S: Into<String>>(name: S, description: S, unit: S) -> Result<Self> {
        Self::new(name, description, unit, MeasureKind::Long)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn kind(&self) -> MeasureKind {
        self.kind
    }
}

/// Recorded value of a single measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasureValue {
    Double(f64),
    Long(i64),
}

impl MeasureValue {
    /// Every aggregation works in `f64`; long values are widened.
    pub fn as_f64(self) -> f64 {
        match self {
            MeasureValue::Double(v) => v,
            MeasureValue::Long(v) => v as f64,
        }
    }
}

impl From<f64> for MeasureValue {
    fn from(value: f64) -> Self {
        MeasureValue::Double(value)
    }
}

impl From<i64> for MeasureValue {
    fn from(value: i64) -> Self {
        MeasureValue::Long(value)
    }
}

/// One value recorded against one measure.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub measure: Measure,
    pub value: MeasureValue,
}

/// Contextual key/value pairs carried by a recording onto distribution
/// exemplars.
pub type Attachments = BTreeMap<String, String>;

/// Batch of measurements recorded under one set of tags.
///
/// Holds at most one entry per measure name; a later `put` replaces the
/// earlier value in place. Attachments apply to every measurement in the
/// batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureMap {
    measurements: Vec<Measurement>,
    attachments: Attachments,
}

impl MeasureMap {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn put<V: Into<MeasureValue>>(mut self, measure: &Measure, value: V) -> Self {
        let value = value.into();
        match self
            .measurements
            .iter_mut()
            .find(|m| m.measure.name() == measure.name())
        {
            Some(existing) => {
                existing.measure = measure.clone();
                existing.value = value;
            },
            None => self.measurements.push(Measurement {
                measure: measure.clone(),
                value,
            }),
        }
        self
    }

    /// Attaches `key = value` to this batch. A later value for the same key
    /// wins.
    #[must_use]
    pub fn put_attachment<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.attachments.insert(key.into(), value.into());
        self
    }

    pub fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }
}

impl<'a> IntoIterator for &'a MeasureMap {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
