//! Entry point for recording, registering and querying.
//!
//! All mutation goes through one mutex around the registry. In queued mode
//! records are handed to a single worker thread over a channel and applied
//! in submission order; in direct mode they are applied on the caller's
//! thread. Both modes produce the same view data for the same call order.

use crate::core::clock::Clock;
use crate::core::config::{Config, RecorderConfig, RecorderMode};
use crate::core::error::{Result, StatsError};
use crate::core::types::{TagMap, Timestamp};
use crate::stats::measure::MeasureMap;
use crate::stats::registry::MeasureToViewMap;
use crate::stats::view::{View, ViewName};
use crate::stats::view_data::ViewData;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// Whether recorded values are aggregated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionState {
    #[default]
    Enabled,
    Disabled,
}

/// Everything guarded by the manager's single critical section.
#[derive(Debug)]
struct Inner {
    registry: MeasureToViewMap,
    state: CollectionState,
    state_read: bool,
}

struct Shared {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    /// Reads the state without marking it read.
    fn is_enabled(&self) -> bool {
        self.inner.lock().state == CollectionState::Enabled
    }

    fn apply_record(&self, tags: &TagMap, measurements: &MeasureMap, timestamp: Timestamp) {
        let mut inner = self.inner.lock();
        if inner.state == CollectionState::Disabled {
            return;
        }
        inner.registry.record(tags, measurements, timestamp);
    }
}

enum RecordTask {
    Record {
        tags: TagMap,
        measurements: MeasureMap,
        timestamp: Timestamp,
    },
    Flush(Sender<()>),
    Shutdown,
}

/// Thread-safe stats engine.
pub struct StatsManager {
    shared: Arc<Shared>,
    mode: RecorderMode,
    sender: Option<Sender<RecordTask>>,
    worker: Option<JoinHandle<()>>,
}

impl StatsManager {
    pub fn new(
        recorder: &RecorderConfig,
        initial_state: CollectionState,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                registry: MeasureToViewMap::new(),
                state: initial_state,
                state_read: false,
            }),
            clock,
        });

        let (sender, worker) = match recorder.mode {
            RecorderMode::Direct => (None, None),
            RecorderMode::Queued => {
                let (sender, receiver) = match recorder.queue_capacity {
                    Some(capacity) => bounded(capacity),
                    None => unbounded(),
                };
                let worker = Self::start_worker(Arc::clone(&shared), receiver)?;
                (Some(sender), Some(worker))
            },
        };

        Ok(Self {
            shared,
            mode: recorder.mode,
            sender,
            worker,
        })
    }

    /// Synchronous manager; records are applied before `record` returns.
    pub fn direct(clock: Arc<dyn Clock>) -> Result<Self> {
        let recorder = RecorderConfig {
            mode: RecorderMode::Direct,
            queue_capacity: None,
        };
        Self::new(&recorder, CollectionState::Enabled, clock)
    }

    /// Manager with an unbounded record queue and one worker thread.
    pub fn queued(clock: Arc<dyn Clock>) -> Result<Self> {
        Self::new(&RecorderConfig::default(), CollectionState::Enabled, clock)
    }

    /// Builds a manager from `config` and registers its views.
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self> {
        let manager = Self::new(&config.recorder, config.collection.initial_state, clock)?;
        for view in &config.views {
            manager.register_view(view.to_view()?)?;
        }
        Ok(manager)
    }

    fn start_worker(shared: Arc<Shared>, receiver: Receiver<RecordTask>) -> Result<JoinHandle<()>> {
        let handle = std::thread::Builder::new()
            .name("viewstats-recorder".to_string())
            .spawn(move || {
                info!("Record worker started");
                while let Ok(task) = receiver.recv() {
                    match task {
                        RecordTask::Record {
                            tags,
                            measurements,
                            timestamp,
                        } => shared.apply_record(&tags, &measurements, timestamp),
                        RecordTask::Flush(ack) => {
                            let _ = ack.send(());
                        },
                        RecordTask::Shutdown => break,
                    }
                }
                info!("Record worker stopped");
            })?;
        Ok(handle)
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }

    /// Records `measurements` under `tags` at the current clock time.
    pub fn record(&self, tags: &TagMap, measurements: MeasureMap) -> Result<()> {
        let timestamp = self.shared.clock.now();
        self.record_at(tags, measurements, timestamp)
    }

    pub fn record_at(
        &self,
        tags: &TagMap,
        measurements: MeasureMap,
        timestamp: Timestamp,
    ) -> Result<()> {
        match &self.sender {
            // Gated on submission as well as on apply.
            Some(_) if !self.shared.is_enabled() => Ok(()),
            Some(sender) => sender
                .send(RecordTask::Record {
                    tags: tags.clone(),
                    measurements,
                    timestamp,
                })
                .map_err(|_| StatsError::ChannelSend),
            None => {
                self.shared.apply_record(tags, &measurements, timestamp);
                Ok(())
            },
        }
    }

    /// Blocks until every record submitted before this call has been applied.
    pub fn flush(&self) -> Result<()> {
        let Some(sender) = &self.sender else {
            return Ok(());
        };
        let (ack_sender, ack_receiver) = bounded(1);
        sender
            .send(RecordTask::Flush(ack_sender))
            .map_err(|_| StatsError::ChannelSend)?;
        ack_receiver.recv().map_err(|_| StatsError::ChannelReceive)
    }

    /// Registers `view`. Views registered while collection is disabled are
    /// kept, but accumulate nothing until collection is enabled.
    pub fn register_view(&self, view: View) -> Result<()> {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock();
        inner.registry.register_view(view, now)
    }

    pub fn get_view(&self, name: &ViewName) -> Result<ViewData> {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock();
        let state = inner.state;
        debug!(view = %name, %now, "Querying view");
        inner.registry.get_view(name, now, state)
    }

    pub fn registered_views(&self) -> Vec<View> {
        self.shared.inner.lock().registry.registered_views()
    }

    /// Views meant for periodic export: the cumulative ones.
    pub fn exported_views(&self) -> Vec<View> {
        self.shared.inner.lock().registry.exported_views()
    }

    /// Current collection state. After this is called, the state can no
    /// longer be changed.
    pub fn state(&self) -> CollectionState {
        let mut inner = self.shared.inner.lock();
        inner.state_read = true;
        inner.state
    }

    /// Changes the collection state.
    ///
    /// Disabling drops all accumulated stats. Enabling restarts every window
    /// at the current time.
    pub fn set_state(&self, state: CollectionState) -> Result<()> {
        let now = self.shared.clock.now();
        let mut inner = self.shared.inner.lock();
        if inner.state_read {
            return Err(StatsError::StateAlreadyRead);
        }
        if inner.state == state {
            return Ok(());
        }
        match state {
            CollectionState::Disabled => inner.registry.clear_stats(),
            CollectionState::Enabled => inner.registry.resume_stats_collection(now),
        }
        info!(from = ?inner.state, to = ?state, "Stats collection state changed");
        inner.state = state;
        Ok(())
    }
}

impl Drop for StatsManager {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            if sender.send(RecordTask::Shutdown).is_err() {
                warn!("Record worker already gone");
            }
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Record worker panicked");
            }
        }
    }
}

impl std::fmt::Debug for StatsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsManager")
            .field("mode", &self.mode)
            .field("inner", &*self.shared.inner.lock())
            .finish()
    }
}
