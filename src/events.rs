//! Fire-and-forget application events
//!
//! Subscribers receive events emitted after they subscribed. There is no
//! queueing for absent subscribers and no replay. Each subscriber has a
//! bounded queue; while it is full, further events for that subscriber are
//! dropped. A subscriber whose receiver has been dropped is forgotten on the
//! next emit.

use crate::update::UpdateInfo;
use parking_lot::Mutex;
use std::sync::{Arc, mpsc};
use tracing::debug;

/// Events queued per subscriber before further events are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Events broadcast to the front end
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Show the launcher panel
    PanelShow,
    /// Hide the launcher panel
    PanelHide,
    /// Show the launcher panel on a specific view (e.g. "settings")
    PanelShowView(String),
    /// A startup check found a newer release
    UpdateAvailable(UpdateInfo),
    /// An update has been downloaded, verified and installed
    UpdateReady {
        /// Installed version
        version: String,
    },
}

impl AppEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::PanelShow => "panel:show",
            Self::PanelHide => "panel:hide",
            Self::PanelShowView(_) => "panel:show:view",
            Self::UpdateAvailable(_) => "update:available",
            Self::UpdateReady { .. } => "update:ready",
        }
    }
}

/// Cloneable broadcast hub for [`AppEvent`]s
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::SyncSender<AppEvent>>>>,
}

impl EventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Start receiving events emitted from now on
    pub fn subscribe(&self) -> mpsc::Receiver<AppEvent> {
        let (tx, rx) = mpsc::sync_channel(EVENT_QUEUE_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber without blocking
    pub fn emit(&self, event: &AppEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::TrySendError::Full(_)) => {
                debug!("Event queue full, dropping {}", event.name());
                true
            }
            Err(mpsc::TrySendError::Disconnected(_)) => false,
        });
        debug!(
            "Event {} delivered to {} subscriber(s)",
            event.name(),
            subscribers.len()
        );
    }

    /// Number of live subscribers as of the last emit
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}
