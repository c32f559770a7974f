//! # Run Tracker
//!
//! Async owner of the [`RunStateMachine`].
//!
//! While a run is active one background task (the pump) selects over the
//! location subscription and a periodic tick, feeds both into the state
//! machine's reducer and publishes the resulting [`LiveStats`] on a
//! `tokio::sync::watch` channel. Pausing or stopping aborts the pump, which
//! drops the subscription.
//!
//! ## Example
//! ```rust,no_run
//! # #[cfg(feature = "persistence")]
//! # async fn run() -> rush_tracker::Result<()> {
//! use std::sync::Arc;
//! use rush_tracker::{
//!     ChannelLocationSource, RunTracker, SqliteSessionStore, SystemClock, TrackerConfig,
//! };
//!
//! let source = Arc::new(ChannelLocationSource::new());
//! let store = Arc::new(SqliteSessionStore::open("runs.db")?);
//! let tracker = RunTracker::new(TrackerConfig::default(), source, store, Arc::new(SystemClock))?;
//!
//! let mut live = tracker.subscribe_live();
//! tracker.start()?;
//! live.changed().await.ok();
//! let session = tracker.stop().await?;
//! println!("{:.0} m", session.distance_meters);
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::location::LocationSource;
use crate::session::{LiveStats, RunSession, RunState, RunStateMachine, Trigger};
use crate::store::SessionStore;
use crate::GeoSample;

/// Live run tracker.
///
/// Owns the single active run. The session store, location source and
/// clock are injected at construction.
pub struct RunTracker {
    machine: Arc<Mutex<RunStateMachine>>,
    live_tx: Arc<watch::Sender<LiveStats>>,
    source: Arc<dyn LocationSource>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    config: TrackerConfig,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl RunTracker {
    pub fn new(
        config: TrackerConfig,
        source: Arc<dyn LocationSource>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let (live_tx, _) = watch::channel(LiveStats::default());

        Ok(Self {
            machine: Arc::new(Mutex::new(RunStateMachine::new(config.clone()))),
            live_tx: Arc::new(live_tx),
            source,
            store,
            clock,
            config,
            pump: Mutex::new(None),
        })
    }

    /// Receiver of live statistics. The current value is available at once.
    pub fn subscribe_live(&self) -> watch::Receiver<LiveStats> {
        self.live_tx.subscribe()
    }

    pub fn live_stats(&self) -> LiveStats {
        self.live_tx.borrow().clone()
    }

    pub fn state(&self) -> RunState {
        lock(&self.machine).state()
    }

    /// Id of the active run, if any.
    pub fn current_session_id(&self) -> Option<String> {
        let machine = lock(&self.machine);
        match machine.state() {
            RunState::Idle => None,
            _ => Some(machine.current_session().id.clone()),
        }
    }

    /// The store finished runs are saved to.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start a new run and return its id.
    ///
    /// Must be called from within a tokio runtime. Fails with
    /// `AlreadyActive` if a run is running or paused.
    pub fn start(&self) -> Result<String> {
        let handle = runtime_handle()?;
        let now = self.clock.now_millis();
        let id = Uuid::new_v4().to_string();
        let permission_granted = self.source.permission_granted();

        let epoch = {
            let mut machine = lock(&self.machine);
            let epoch = machine.start(id.clone(), now)?;
            machine.set_permission_denied(!permission_granted);
            if let Some(last) = self.source.last_known() {
                machine.seed_location(last.point());
            }
            self.publish(&machine);
            epoch
        };

        if !permission_granted {
            warn!("[RunTracker] Location permission denied, run {} records no samples", id);
        }
        self.spawn_pump(&handle, epoch);

        info!("[RunTracker] Run started: {}", id);
        Ok(id)
    }

    /// Pause the running session. Returns false if it was not running.
    pub fn pause(&self) -> bool {
        let now = self.clock.now_millis();
        {
            let mut machine = lock(&self.machine);
            if !machine.pause(now) {
                return false;
            }
            self.publish(&machine);
        }

        self.abort_pump();
        info!("[RunTracker] Run paused");
        true
    }

    /// Resume a paused session. Returns false if it was not paused.
    pub fn resume(&self) -> Result<bool> {
        let handle = runtime_handle()?;
        let now = self.clock.now_millis();
        let resumed = {
            let mut machine = lock(&self.machine);
            let epoch = machine.resume(now);
            if epoch.is_some() {
                self.publish(&machine);
            }
            epoch
        };

        let Some(epoch) = resumed else {
            return Ok(false);
        };
        self.spawn_pump(&handle, epoch);
        info!("[RunTracker] Run resumed");
        Ok(true)
    }

    /// Stop the active run, save it and return the finished session.
    ///
    /// The tracker is idle afterwards even if saving fails; the failure is
    /// returned as `SaveFailed` carrying the session so it can be retried.
    pub async fn stop(&self) -> Result<RunSession> {
        let now = self.clock.now_millis();
        let finished = {
            let mut machine = lock(&self.machine);
            let finished = machine.stop(now).ok_or(TrackerError::NotActive)?;
            self.publish(&machine);
            finished
        };

        self.abort_pump();
        info!(
            "[RunTracker] Run stopped: {} ({:.0} m in {} s)",
            finished.id,
            finished.distance_meters,
            finished.duration_secs()
        );

        let store = Arc::clone(&self.store);
        let to_save = finished.clone();
        let saved = tokio::task::spawn_blocking(move || store.append(&to_save))
            .await
            .map_err(TrackerError::from)
            .and_then(|result| result);

        match saved {
            Ok(()) => Ok(finished),
            Err(e) => {
                error!("[RunTracker] Failed to save session {}: {}", finished.id, e);
                Err(TrackerError::SaveFailed {
                    message: e.to_string(),
                    session: Box::new(finished),
                })
            }
        }
    }

    // ========================================================================
    // Pump
    // ========================================================================

    fn spawn_pump(&self, handle: &Handle, epoch: u64) {
        // Subscribe before returning so fixes pushed right after start/resume
        // are not missed
        let stream = self.source.subscribe();
        let task = handle.spawn(pump(
            Arc::clone(&self.machine),
            Arc::clone(&self.live_tx),
            Arc::clone(&self.clock),
            stream,
            epoch,
            self.config.tick_interval(),
        ));

        let previous = lock(&self.pump).replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn abort_pump(&self) {
        if let Some(task) = lock(&self.pump).take() {
            task.abort();
        }
    }

    /// Publish the machine's live stats. Called with the machine locked so
    /// snapshots go out in transition order.
    fn publish(&self, machine: &RunStateMachine) {
        self.live_tx.send_replace(machine.live_stats().clone());
    }
}

impl Drop for RunTracker {
    fn drop(&mut self) {
        self.abort_pump();
    }
}

/// Apply one trigger and publish the result under the lock. Returns false
/// once `epoch` is stale.
fn step(
    machine: &Mutex<RunStateMachine>,
    live_tx: &watch::Sender<LiveStats>,
    epoch: u64,
    trigger: Trigger,
    now: i64,
) -> bool {
    let mut machine = lock(machine);
    if machine.epoch() != epoch {
        return false;
    }
    if machine.apply(epoch, trigger, now) {
        live_tx.send_replace(machine.live_stats().clone());
    }
    true
}

async fn pump(
    machine: Arc<Mutex<RunStateMachine>>,
    live_tx: Arc<watch::Sender<LiveStats>>,
    clock: Arc<dyn Clock>,
    mut stream: BoxStream<'static, GeoSample>,
    epoch: u64,
    period: Duration,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stream_open = true;

    loop {
        let trigger = tokio::select! {
            next = stream.next(), if stream_open => match next {
                Some(sample) => Trigger::Sample(sample),
                None => {
                    debug!("[RunTracker] Location stream ended, ticking only");
                    stream_open = false;
                    continue;
                }
            },
            _ = ticker.tick() => Trigger::Tick,
        };

        if !step(&machine, &live_tx, epoch, trigger, clock.now_millis()) {
            break;
        }
    }
}

fn runtime_handle() -> Result<Handle> {
    Handle::try_current().map_err(|e| TrackerError::TaskFailed {
        message: e.to_string(),
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Tests
// ============================================================================
