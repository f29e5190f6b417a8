//! Registry mapping measures to the views that aggregate them.

use crate::core::error::{Result, StatsError};
use crate::core::types::{TagMap, Timestamp};
use crate::stats::manager::CollectionState;
use crate::stats::measure::{Measure, MeasureMap};
use crate::stats::view::{View, ViewName, Window};
use crate::stats::view_data::{MutableViewData, ViewData};
use ahash::AHashMap;
use tracing::{debug, warn};

/// All registered views and their accumulated state.
///
/// Not synchronized; [`StatsManager`](crate::stats::StatsManager) owns it
/// behind a single mutex.
#[derive(Debug, Default)]
pub struct MeasureToViewMap {
    /// Measure name to the names of the views over it.
    views_by_measure: AHashMap<String, Vec<ViewName>>,
    view_data: AHashMap<ViewName, MutableViewData>,
    measures: AHashMap<String, Measure>,
}

impl MeasureToViewMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `view`, seeding its window at `now`.
    ///
    /// Registering an identical view again is a no-op.
    pub fn register_view(&mut self, view: View, now: Timestamp) -> Result<()> {
        if let Some(existing) = self.view_data.get(view.name()) {
            if existing.view() == &view {
                debug!(view = %view.name(), "View already registered");
                return Ok(());
            }
            warn!(view = %view.name(), "Rejected conflicting view registration");
            return Err(StatsError::ViewConflict(view.name().to_string()));
        }

        let measure = view.measure();
        if let Some(registered) = self.measures.get(measure.name()) {
            if registered != measure {
                warn!(measure = measure.name(), "Rejected conflicting measure definition");
                return Err(StatsError::MeasureConflict(measure.name().to_string()));
            }
        }

        let data = MutableViewData::new(view.clone(), now)?;
        self.measures
            .entry(measure.name().to_string())
            .or_insert_with(|| measure.clone());
        self.views_by_measure
            .entry(measure.name().to_string())
            .or_default()
            .push(view.name().clone());
        debug!(view = %view.name(), measure = measure.name(), %now, "Registered view");
        self.view_data.insert(view.name().clone(), data);
        Ok(())
    }

    /// Snapshot of the named view at `now`. Never clears accumulated state.
    pub fn get_view(
        &mut self,
        name: &ViewName,
        now: Timestamp,
        state: CollectionState,
    ) -> Result<ViewData> {
        let data = self
            .view_data
            .get_mut(name)
            .ok_or_else(|| StatsError::ViewNotFound(name.to_string()))?;
        data.snapshot(now, state)
    }

    /// Delivers every measurement to the views of its measure.
    ///
    /// Measurements of unknown measures, or of a measure registered with a
    /// different definition, are skipped.
    pub fn record(&mut self, tags: &TagMap, measurements: &MeasureMap, timestamp: Timestamp) {
        for measurement in measurements {
            let measure = &measurement.measure;
            match self.measures.get(measure.name()) {
                Some(registered) if registered == measure => {},
                _ => continue,
            }
            let Some(view_names) = self.views_by_measure.get(measure.name()) else {
                continue;
            };
            let value = measurement.value.as_f64();
            for view_name in view_names {
                let Some(data) = self.view_data.get_mut(view_name) else {
                    continue;
                };
                if let Err(e) = data.record(tags, value, measurements.attachments(), timestamp) {
                    warn!(
                        view = %view_name,
                        category = e.category(),
                        "Dropped record: {}",
                        e
                    );
                }
            }
        }
    }

    pub fn clear_stats(&mut self) {
        for data in self.view_data.values_mut() {
            data.clear_stats();
        }
    }

    pub fn resume_stats_collection(&mut self, now: Timestamp) {
        for (name, data) in &mut self.view_data {
            if let Err(e) = data.resume(now) {
                warn!(view = %name, "Failed to resume view: {}", e);
            }
        }
    }

    /// All registered views, ordered by name.
    pub fn registered_views(&self) -> Vec<View> {
        let mut views: Vec<View> = self.view_data.values().map(|d| d.view().clone()).collect();
        views.sort_by(|a, b| a.name().cmp(b.name()));
        views
    }

    /// Registered views with a cumulative window, ordered by name.
    pub fn exported_views(&self) -> Vec<View> {
        self.registered_views()
            .into_iter()
            .filter(|view| view.window() == Window::Cumulative)
            .collect()
    }
}
