#![allow(dead_code)]

use application_insights_sdk::{
    ConsoleSink, DiscardReason, Error, NextPlugin, NotificationListener, PluginContext,
    PluginKind, TelemetryItem, TelemetryPlugin,
};
use std::sync::{Arc, Mutex};

// Fake instrumentation key (this is a random uuid)
pub const INSTRUMENTATION_KEY: &str = "0fdcec70-0ce5-4085-89d9-9ae8ead9af66";

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A channel keeping every item it receives.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    pub id: String,
    pub priority: u32,
    pub items: Mutex<Vec<TelemetryItem>>,
    pub events: Log,
}

impl RecordingChannel {
    pub fn new(id: &str, priority: u32) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            priority,
            ..Default::default()
        })
    }

    pub fn items(&self) -> Vec<TelemetryItem> {
        self.items.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.items().into_iter().map(|item| item.name).collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl TelemetryPlugin for RecordingChannel {
    fn identifier(&self) -> &str {
        &self.id
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn initialize(&self, _context: &PluginContext) -> Result<(), Error> {
        self.events.lock().unwrap().push("initialize".into());
        Ok(())
    }

    fn process_telemetry(
        &self,
        item: &mut TelemetryItem,
        next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        self.items.lock().unwrap().push(item.clone());
        next.process(item)
    }

    fn pause(&self) {
        self.events.lock().unwrap().push("pause".into());
    }

    fn resume(&self) {
        self.events.lock().unwrap().push("resume".into());
    }

    fn flush(&self, is_async: bool) -> Result<(), Error> {
        self.events
            .lock()
            .unwrap()
            .push(format!("flush:{}", is_async));
        Ok(())
    }

    fn teardown(&self) {
        self.events.lock().unwrap().push("teardown".into());
    }
}

/// A plugin writing `init:<id>` on initialization and `<id>` for every item to a shared log.
#[derive(Debug)]
pub struct TracingPlugin {
    pub id: &'static str,
    pub priority: u32,
    pub kind: PluginKind,
    pub log: Log,
}

impl TracingPlugin {
    pub fn new(id: &'static str, priority: u32, kind: PluginKind, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            id,
            priority,
            kind,
            log: log.clone(),
        })
    }
}

impl TelemetryPlugin for TracingPlugin {
    fn identifier(&self) -> &str {
        self.id
    }

    fn priority(&self) -> u32 {
        self.priority
    }

    fn kind(&self) -> PluginKind {
        self.kind
    }

    fn initialize(&self, _context: &PluginContext) -> Result<(), Error> {
        self.log.lock().unwrap().push(format!("init:{}", self.id));
        Ok(())
    }

    fn process_telemetry(
        &self,
        item: &mut TelemetryItem,
        next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        self.log.lock().unwrap().push(self.id.to_string());
        next.process(item)
    }
}

/// A plugin failing on every item.
#[derive(Debug)]
pub struct FailingPlugin;

impl TelemetryPlugin for FailingPlugin {
    fn identifier(&self) -> &str {
        "FailingPlugin"
    }

    fn priority(&self) -> u32 {
        50
    }

    fn initialize(&self, _context: &PluginContext) -> Result<(), Error> {
        Ok(())
    }

    fn process_telemetry(
        &self,
        _item: &mut TelemetryItem,
        _next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        Err(Error::plugin("FailingPlugin", "backend unavailable"))
    }
}

/// A channel panicking on every item.
#[derive(Debug)]
pub struct PanickingChannel;

impl TelemetryPlugin for PanickingChannel {
    fn identifier(&self) -> &str {
        "PanickingChannel"
    }

    fn priority(&self) -> u32 {
        1000
    }

    fn initialize(&self, _context: &PluginContext) -> Result<(), Error> {
        Ok(())
    }

    fn process_telemetry(
        &self,
        _item: &mut TelemetryItem,
        _next: NextPlugin<'_>,
    ) -> Result<(), Error> {
        panic!("channel buffer corrupted")
    }
}

#[derive(Debug, Default)]
pub struct DiscardRecorder(pub Mutex<Vec<(usize, DiscardReason)>>);

impl NotificationListener for DiscardRecorder {
    fn events_discarded(&self, items: &[TelemetryItem], reason: DiscardReason) {
        self.0.lock().unwrap().push((items.len(), reason));
    }
}

#[derive(Debug, Default, Clone)]
pub struct RecordingConsole(pub Log);

impl RecordingConsole {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl ConsoleSink for RecordingConsole {
    fn warn(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}
