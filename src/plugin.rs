//! The plugin capability model.
//!
//! Every stage of the pipeline is a [`TelemetryPlugin`]. Processing plugins form a chain ordered
//! by ascending priority. Each one receives the item together with a [`NextPlugin`] cursor and
//! decides whether to pass it on; not calling [`NextPlugin::process`] drops the item.

use crate::{
    clock::Clock, models::TelemetryItem, notification::NotificationManager,
    storage::PersistenceStore, Config, DiagnosticLogger, Error,
};
use std::{fmt::Debug, sync::Arc};

/// Plugins with a priority at or above this value are channels.
pub const CHANNEL_CONTROLLER_PRIORITY: u32 = 100;

/// What a plugin takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginKind {
    /// Initialized and linked into the processing chain.
    Processing,
    /// Initialized only. Never sees telemetry.
    InitOnly,
}

/// A pipeline stage.
///
/// Plugins are shared between threads, so state changes go through interior mutability.
pub trait TelemetryPlugin: Debug + Send + Sync {
    /// Unique name of the plugin.
    fn identifier(&self) -> &str;

    /// Position in the chain. Lower runs earlier. Channels use
    /// [`CHANNEL_CONTROLLER_PRIORITY`] and above.
    fn priority(&self) -> u32;

    /// Whether the plugin processes telemetry.
    fn kind(&self) -> PluginKind {
        PluginKind::Processing
    }

    /// Called once, in chain order, before any telemetry is processed.
    fn initialize(&self, context: &PluginContext) -> Result<(), Error>;

    /// Handle `item` and usually pass it on to `next`.
    fn process_telemetry(
        &self,
        item: &mut TelemetryItem,
        next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        next.process(item)
    }

    /// Stop sending until [`resume`](Self::resume). Meaningful for channels.
    fn pause(&self) {}

    /// Resume sending.
    fn resume(&self) {}

    /// Send everything buffered. Meaningful for channels.
    fn flush(&self, _is_async: bool) -> Result<(), Error> {
        Ok(())
    }

    /// Release resources. Called once when the pipeline is torn down.
    fn teardown(&self) {}
}

/// The rest of the chain after the current plugin.
#[derive(Debug, Clone, Copy)]
pub struct NextPlugin<'a> {
    chain: &'a [Arc<dyn TelemetryPlugin>],
}

impl<'a> NextPlugin<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn TelemetryPlugin>]) -> Self {
        Self { chain }
    }

    /// Hand `item` to the next plugin. Does nothing at the end of the chain.
    pub fn process(self, item: &mut TelemetryItem) -> Result<(), Error> {
        match self.chain.split_first() {
            Some((plugin, rest)) => plugin.process_telemetry(item, NextPlugin::new(rest)),
            None => Ok(()),
        }
    }

    /// Identifier of the next plugin.
    pub fn identifier(&self) -> Option<&str> {
        self.chain.first().map(|plugin| plugin.identifier())
    }

    /// Whether there is no next plugin.
    pub fn is_end(&self) -> bool {
        self.chain.is_empty()
    }
}

/// What a plugin gets to see of the SDK at initialization.
#[derive(Debug, Clone)]
pub struct PluginContext {
    config: Arc<Config>,
    logger: Arc<DiagnosticLogger>,
    notifications: Arc<NotificationManager>,
    store: Arc<dyn PersistenceStore>,
    clock: Arc<dyn Clock>,
    extensions: Vec<Arc<dyn TelemetryPlugin>>,
}

impl PluginContext {
    pub(crate) fn new(
        config: Arc<Config>,
        logger: Arc<DiagnosticLogger>,
        notifications: Arc<NotificationManager>,
        store: Arc<dyn PersistenceStore>,
        clock: Arc<dyn Clock>,
        extensions: Vec<Arc<dyn TelemetryPlugin>>,
    ) -> Self {
        Self {
            config,
            logger,
            notifications,
            store,
            clock,
            extensions,
        }
    }

    /// The validated configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The diagnostic logger of this SDK instance.
    pub fn logger(&self) -> &Arc<DiagnosticLogger> {
        &self.logger
    }

    /// Sent and discarded notifications.
    pub fn notifications(&self) -> &Arc<NotificationManager> {
        &self.notifications
    }

    /// Cookie and local storage.
    pub fn store(&self) -> &Arc<dyn PersistenceStore> {
        &self.store
    }

    /// Wall clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// All extensions in initialization order.
    pub fn extensions(&self) -> &[Arc<dyn TelemetryPlugin>] {
        &self.extensions
    }

    /// Find an extension by identifier.
    pub fn extension(&self, identifier: &str) -> Option<&Arc<dyn TelemetryPlugin>> {
        self.extensions
            .iter()
            .find(|extension| extension.identifier() == identifier)
    }
}
