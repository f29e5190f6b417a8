//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use viewstats::core::config::{RecorderConfig, RecorderMode};
use viewstats::core::{ManualClock, TagKey, TagMap, TagValue, Timestamp};
use viewstats::stats::{
    Aggregation, CollectionState, Measure, MeasureMap, StatsManager, View, ViewName, Window,
};

pub const KEY: &str = "method";

pub fn key() -> TagKey {
    TagKey::new(KEY).unwrap()
}

pub fn tags(value: &str) -> TagMap {
    TagMap::new().with(key(), TagValue::new(value).unwrap())
}

pub fn latency() -> Measure {
    Measure::double("latency", "Request latency", "ms").unwrap()
}

pub fn bytes() -> Measure {
    Measure::long("bytes", "Response size", "By").unwrap()
}

pub fn record(manager: &StatsManager, tags: &TagMap, measure: &Measure, value: f64) {
    manager
        .record(tags, MeasureMap::new().put(measure, value))
        .unwrap();
}

/// Test fixture builder for views with sensible defaults.
pub struct TestViewBuilder {
    name: String,
    description: String,
    measure: Measure,
    aggregation: Aggregation,
    columns: Vec<TagKey>,
    window: Window,
}

impl TestViewBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: "test view".to_string(),
            measure: latency(),
            aggregation: Aggregation::Sum,
            columns: vec![key()],
            window: Window::Cumulative,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn measure(mut self, measure: Measure) -> Self {
        self.measure = measure;
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn columns(mut self, columns: Vec<TagKey>) -> Self {
        self.columns = columns;
        self
    }

    pub fn interval(mut self, duration: Duration) -> Self {
        self.window = Window::Interval(duration);
        self
    }

    pub fn build(self) -> View {
        View::new(
            ViewName::new(self.name).unwrap(),
            self.description,
            self.measure,
            self.aggregation,
            self.columns,
            self.window,
        )
        .unwrap()
    }
}

/// A manager in the given mode, driven by a manual clock starting at `start`.
pub fn manager_at(mode: RecorderMode, start: Timestamp) -> (StatsManager, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    let recorder = RecorderConfig {
        mode,
        queue_capacity: None,
    };
    let manager = StatsManager::new(&recorder, CollectionState::Enabled, clock.clone()).unwrap();
    (manager, clock)
}

pub fn direct_manager() -> (StatsManager, Arc<ManualClock>) {
    manager_at(RecorderMode::Direct, Timestamp::from_secs(10))
}
