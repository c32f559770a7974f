//! Location source contract.
//!
//! Platform location services sit behind [`LocationSource`]. A subscription
//! is a stream of [`GeoSample`]s; dropping the stream unsubscribes.
//!
//! [`ChannelLocationSource`] is the in-process implementation: a platform
//! bridge (or a test) pushes fixes in, and every live subscriber receives
//! them in arrival order.

use std::sync::{Mutex, PoisonError};

use futures::stream::{self, BoxStream, StreamExt};
use log::debug;
use tokio::sync::mpsc;

use crate::GeoSample;

/// A source of position fixes.
pub trait LocationSource: Send + Sync {
    /// Subscribe to position updates. Dropping the stream unsubscribes.
    fn subscribe(&self) -> BoxStream<'static, GeoSample>;

    /// Most recent fix known to the platform, if any. Used to seed the map
    /// when a run starts.
    fn last_known(&self) -> Option<GeoSample> {
        None
    }

    /// Whether the app may read the device location.
    fn permission_granted(&self) -> bool {
        true
    }
}

#[derive(Debug)]
struct ChannelState {
    subscribers: Vec<mpsc::UnboundedSender<GeoSample>>,
    last_known: Option<GeoSample>,
    permission_granted: bool,
}

/// Location source fed by [`ChannelLocationSource::push`].
#[derive(Debug)]
pub struct ChannelLocationSource {
    state: Mutex<ChannelState>,
}

impl Default for ChannelLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelLocationSource {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChannelState {
                subscribers: Vec::new(),
                last_known: None,
                permission_granted: true,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a fix to every live subscriber. Returns how many received it.
    pub fn push(&self, sample: GeoSample) -> usize {
        let mut state = self.lock();
        state.last_known = Some(sample);
        state
            .subscribers
            .retain(|tx| tx.send(sample).is_ok());
        state.subscribers.len()
    }

    /// Number of subscriptions whose stream is still alive.
    pub fn subscriber_count(&self) -> usize {
        let mut state = self.lock();
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    pub fn set_last_known(&self, sample: Option<GeoSample>) {
        self.lock().last_known = sample;
    }

    pub fn set_permission_granted(&self, granted: bool) {
        self.lock().permission_granted = granted;
    }
}

impl LocationSource for ChannelLocationSource {
    fn subscribe(&self) -> BoxStream<'static, GeoSample> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        if !state.permission_granted {
            debug!("[Location] Permission not granted, subscription stays empty");
            return stream::empty().boxed();
        }
        state.subscribers.push(tx);
        debug!(
            "[Location] New subscription ({} live)",
            state.subscribers.len()
        );

        stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|sample| (sample, rx))
        })
        .boxed()
    }

    fn last_known(&self) -> Option<GeoSample> {
        self.lock().last_known
    }

    fn permission_granted(&self) -> bool {
        self.lock().permission_granted
    }
}
