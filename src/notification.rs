//! Listeners for telemetry that was sent or dropped.

use crate::{
    diagnostics::{InternalLogMessage, InternalMessageId, LoggingSeverity},
    models::TelemetryItem,
    DiagnosticLogger,
};
use serde_json::json;
use std::{
    fmt::{self, Debug, Display},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Why telemetry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum DiscardReason {
    /// Unknown.
    Unknown = 0,
    /// The endpoint answered with a status that will not succeed on retry.
    NonRetryableStatus = 1,
    /// The item failed validation.
    InvalidEvent = 2,
    /// The item is too large.
    SizeLimitExceeded = 3,
    /// The endpoint asked to stop sending this kind of telemetry.
    KillSwitch = 4,
    /// A channel queue was full.
    QueueFull = 5,
}

impl Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Receives pipeline notifications. All methods default to doing nothing.
pub trait NotificationListener: Debug + Send + Sync {
    /// Items were handed off by a channel.
    fn events_sent(&self, _items: &[TelemetryItem]) {}

    /// Items were dropped.
    fn events_discarded(&self, _items: &[TelemetryItem], _reason: DiscardReason) {}
}

/// Fans notifications out to the registered listeners.
///
/// A panicking listener is logged and does not keep the other listeners from being notified.
#[derive(Debug)]
pub struct NotificationManager {
    listeners: Mutex<Vec<Arc<dyn NotificationListener>>>,
    logger: Arc<DiagnosticLogger>,
}

impl NotificationManager {
    pub(crate) fn new(logger: Arc<DiagnosticLogger>) -> Self {
        Self {
            listeners: Mutex::default(),
            logger,
        }
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn NotificationListener>) {
        self.lock().push(listener);
    }

    /// Unregister a listener previously passed to [`add_listener`](Self::add_listener).
    pub fn remove_listener(&self, listener: &Arc<dyn NotificationListener>) {
        self.lock()
            .retain(|registered| !Arc::ptr_eq(registered, listener));
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Notify that `items` were sent.
    pub fn events_sent(&self, items: &[TelemetryItem]) {
        self.notify("eventsSent", |listener| listener.events_sent(items));
    }

    /// Notify that `items` were dropped.
    pub fn events_discarded(&self, items: &[TelemetryItem], reason: DiscardReason) {
        self.notify("eventsDiscarded", |listener| {
            listener.events_discarded(items, reason)
        });
    }

    fn notify(&self, event: &str, f: impl Fn(&dyn NotificationListener)) {
        // Listeners may register other listeners.
        let listeners = self.lock().clone();
        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
                self.logger.log_internal_message(
                    LoggingSeverity::Critical,
                    InternalLogMessage::new(
                        InternalMessageId::NotificationException,
                        "Notification listener panicked",
                        false,
                        Some(&json!({ "event": event })),
                    ),
                );
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<dyn NotificationListener>>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
