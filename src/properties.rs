//! The properties stage: context enrichment, telemetry initializers and sampling.

use crate::{
    context::TelemetryContext,
    diagnostics::{panic_message, InternalMessageId, LoggingSeverity},
    models::{TelemetryItem, NAME_PLACEHOLDER},
    plugin::{NextPlugin, PluginContext, TelemetryPlugin},
    storage::Persistence,
    DiagnosticLogger, Error,
};
use once_cell::sync::OnceCell;
use serde_json::json;
use std::{
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Identifier of the [`PropertiesPlugin`].
pub const PROPERTIES_PLUGIN_IDENTIFIER: &str = "AppInsightsPropertiesPlugin";
const PROPERTIES_PLUGIN_PRIORITY: u32 = 10;

/// A callback run on every item after it was tagged. Returning `false` drops the item.
pub type TelemetryInitializer = Arc<dyn Fn(&mut TelemetryItem) -> bool + Send + Sync>;

struct State {
    context: Mutex<TelemetryContext>,
    logger: Arc<DiagnosticLogger>,
}

/// Stamps every item with the telemetry context, runs the telemetry initializers and applies
/// sampling.
///
/// In order, for every item:
///
/// 1. The automatic session is updated, unless the application set its own session.
/// 2. Session, application, device, internal, location, operation and user tags are added.
/// 3. The sample rate and instrumentation key are stamped.
/// 4. Telemetry initializers run in registration order. The first one returning `false` or
///    panicking drops the item.
/// 5. Items that are not metrics are sampled. Items sampled out are dropped.
/// 6. The `{0}` placeholder in the item name is replaced by the instrumentation key without
///    dashes and the item is passed on.
#[derive(Default)]
pub struct PropertiesPlugin {
    state: OnceCell<State>,
    initializers: Mutex<Vec<TelemetryInitializer>>,
}

impl fmt::Debug for PropertiesPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertiesPlugin")
            .field("initialized", &self.state.get().is_some())
            .field("initializers", &self.lock_initializers().len())
            .finish()
    }
}

impl PropertiesPlugin {
    /// Create an uninitialized plugin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a telemetry initializer. It applies to items processed after this call returns.
    pub fn add_telemetry_initializer(&self, initializer: TelemetryInitializer) {
        self.lock_initializers().push(initializer);
    }

    /// Run `f` with the telemetry context. `None` before initialization.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut TelemetryContext) -> R) -> Option<R> {
        self.state.get().map(|state| f(&mut lock(&state.context)))
    }

    fn lock_initializers(&self) -> MutexGuard<'_, Vec<TelemetryInitializer>> {
        self.initializers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the initializers on a snapshot of the list so that they may register more
    /// initializers or track other items. Returns whether the item may be sent.
    fn run_initializers(
        &self,
        logger: &DiagnosticLogger,
        item: &mut TelemetryItem,
    ) -> Result<bool, Error> {
        let initializers = self.lock_initializers().clone();
        for initializer in initializers {
            match catch_unwind(AssertUnwindSafe(|| initializer(item))) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(panic) => {
                    logger.throw_internal(
                        LoggingSeverity::Critical,
                        InternalMessageId::TelemetryInitializerFailed,
                        "One of telemetry initializers failed, telemetry item will not be sent",
                        Some(json!({ "exception": panic_message(panic.as_ref()) })),
                        true,
                    )?;
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

fn lock(context: &Mutex<TelemetryContext>) -> MutexGuard<'_, TelemetryContext> {
    context.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TelemetryPlugin for PropertiesPlugin {
    fn identifier(&self) -> &str {
        PROPERTIES_PLUGIN_IDENTIFIER
    }

    fn priority(&self) -> u32 {
        PROPERTIES_PLUGIN_PRIORITY
    }

    fn initialize(&self, context: &PluginContext) -> Result<(), Error> {
        if self.state.get().is_some() {
            return Ok(());
        }
        let persistence = Persistence::new(
            context.store().clone(),
            context.logger().clone(),
            context.config(),
        );
        let telemetry_context =
            TelemetryContext::new(context.config(), persistence, context.clock().clone())?;
        let _ = self.state.set(State {
            context: Mutex::new(telemetry_context),
            logger: context.logger().clone(),
        });
        Ok(())
    }

    fn process_telemetry(
        &self,
        item: &mut TelemetryItem,
        next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        let Some(state) = self.state.get() else {
            return next.process(item);
        };

        let instrumentation_key = {
            let mut context = lock(&state.context);
            context.apply(item)?;
            context.instrumentation_key().to_string()
        };

        if !self.run_initializers(&state.logger, item)? {
            return Ok(());
        }

        let sampled_in = item.is_metric() || lock(&state.context).sample.is_sampled_in(item);
        if !sampled_in {
            return state.logger.throw_internal(
                LoggingSeverity::Warning,
                InternalMessageId::TelemetrySampledAndNotSent,
                "Telemetry item was sampled out and not sent",
                Some(json!({ "SampleRate": item.sample_rate })),
                false,
            );
        }

        item.name = item
            .name
            .replace(NAME_PLACEHOLDER, &instrumentation_key.replace('-', ""));
        next.process(item)
    }

    fn teardown(&self) {
        if let Some(state) = self.state.get() {
            if let Err(err) = lock(&state.context).session_manager.backup() {
                log::debug!("session backup failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        models::{Data, EventData},
        notification::NotificationManager,
        storage::{MemoryStore, PersistenceStore, StoreTier},
        Config,
    };

    fn plugin_context(config: Config, store: Arc<MemoryStore>) -> PluginContext {
        let logger = Arc::new(DiagnosticLogger::new(&config));
        PluginContext::new(
            Arc::new(config),
            logger.clone(),
            Arc::new(NotificationManager::new(logger)),
            store,
            Arc::new(ManualClock::new(1_000)),
            Vec::new(),
        )
    }

    fn event() -> TelemetryItem {
        TelemetryItem::new(
            "Microsoft.ApplicationInsights.{0}.Event",
            Data::Event(EventData {
                ver: 2,
                name: "e".into(),
                properties: None,
                measurements: None,
            }),
        )
    }

    #[test]
    fn stamps_context_and_replaces_placeholder() {
        let plugin = PropertiesPlugin::new();
        plugin
            .initialize(&plugin_context(
                Config::new("ab-cd"),
                Arc::new(MemoryStore::new()),
            ))
            .unwrap();
        let end: Vec<Arc<dyn TelemetryPlugin>> = Vec::new();
        let mut item = event();
        plugin
            .process_telemetry(&mut item, NextPlugin::new(&end))
            .unwrap();

        assert_eq!("Microsoft.ApplicationInsights.abcd.Event", item.name);
        assert_eq!(Some("ab-cd"), item.i_key.as_deref());
        assert!(item.tags.contains("ai.session.id"));
        assert_eq!(
            Some(item.tags.get("ai.user.id").map(str::to_string)),
            plugin.with_context(|context| Some(context.user.id.clone()))
        );
    }

    #[test]
    fn uninitialized_plugin_forwards_untouched() {
        let plugin = PropertiesPlugin::new();
        let end: Vec<Arc<dyn TelemetryPlugin>> = Vec::new();
        let mut item = event();
        plugin
            .process_telemetry(&mut item, NextPlugin::new(&end))
            .unwrap();
        assert_eq!(event(), item);
        assert!(plugin.with_context(|_| ()).is_none());
    }

    #[test]
    fn teardown_backs_up_session() {
        let store = Arc::new(MemoryStore::new());
        let plugin = PropertiesPlugin::new();
        plugin
            .initialize(&plugin_context(Config::new("key"), store.clone()))
            .unwrap();
        let end: Vec<Arc<dyn TelemetryPlugin>> = Vec::new();
        plugin
            .process_telemetry(&mut event(), NextPlugin::new(&end))
            .unwrap();
        assert_eq!(None, store.get(StoreTier::Local, "ai_session"));

        plugin.teardown();
        assert_eq!(
            store.get(StoreTier::Cookie, "ai_session"),
            store.get(StoreTier::Local, "ai_session")
        );
    }
}
