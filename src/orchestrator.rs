//! The pipeline orchestrator.

use crate::{
    channel_controller::ChannelController,
    clock::{Clock, SystemClock},
    convert::ms_to_time,
    diagnostics::{ConsoleSink, InternalLogMessage, InternalMessageId, LoggingSeverity},
    models::{Data, MessageData, TelemetryItem},
    notification::{DiscardReason, NotificationListener, NotificationManager},
    plugin::{NextPlugin, PluginContext, PluginKind, TelemetryPlugin, CHANNEL_CONTROLLER_PRIORITY},
    storage::{MemoryStore, PersistenceStore},
    Config, DiagnosticLogger, Error, InvalidEventReason,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc, Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

/// Envelope schema version stamped on items without one.
pub const DEFAULT_SCHEMA_VERSION: &str = "4.0";

/// Builds an [`AppInsightsCore`].
#[derive(Debug)]
pub struct CoreBuilder {
    config: Config,
    extensions: Vec<Arc<dyn TelemetryPlugin>>,
    channel_queues: Vec<Vec<Arc<dyn TelemetryPlugin>>>,
    store: Option<Arc<dyn PersistenceStore>>,
    clock: Option<Arc<dyn Clock>>,
    console: Option<Box<dyn ConsoleSink>>,
}

impl CoreBuilder {
    /// Add an extension. Extensions with a priority in the channel band become channels of the
    /// first channel queue.
    pub fn with_extension(mut self, extension: Arc<dyn TelemetryPlugin>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Add a channel queue.
    pub fn with_channel_queue(mut self, queue: Vec<Arc<dyn TelemetryPlugin>>) -> Self {
        self.channel_queues.push(queue);
        self
    }

    /// Persist cookies and local storage in `store`. Defaults to a [`MemoryStore`].
    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Read time from `clock`. Defaults to the [`SystemClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Echo diagnostics to `console`. Defaults to the [`log`] facade.
    pub fn with_console(mut self, console: Box<dyn ConsoleSink>) -> Self {
        self.console = Some(console);
        self
    }

    /// Validate the configuration, order the plugins and initialize them.
    pub fn build(self) -> Result<AppInsightsCore, Error> {
        let config = Arc::new(self.config.validate()?);
        if self.extensions.is_empty() && self.channel_queues.iter().all(Vec::is_empty) {
            return Err(Error::NoExtensions);
        }

        let logger = Arc::new(match self.console {
            Some(console) => DiagnosticLogger::with_console(&config, console),
            None => DiagnosticLogger::new(&config),
        });
        let notifications = Arc::new(NotificationManager::new(logger.clone()));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn PersistenceStore>);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);

        let (extensions, band) = partition_extensions(self.extensions)?;
        warn_duplicate_priorities(&logger, &extensions);

        let mut channel_queues = self.channel_queues;
        if !band.is_empty() {
            match channel_queues.first_mut() {
                Some(first) => first.extend(band),
                None => channel_queues.push(band),
            }
        }
        let channel_controller = Arc::new(ChannelController::new(channel_queues)?);

        let mut chain: Vec<Arc<dyn TelemetryPlugin>> = extensions
            .iter()
            .filter(|extension| extension.kind() == PluginKind::Processing)
            .cloned()
            .collect();
        chain.push(channel_controller.clone());
        log::debug!(
            "plugin chain: {:?}",
            chain.iter().map(|p| p.identifier()).collect::<Vec<_>>()
        );

        let context = PluginContext::new(
            config.clone(),
            logger.clone(),
            notifications.clone(),
            store,
            clock.clone(),
            extensions.clone(),
        );
        for extension in extensions.iter() {
            extension.initialize(&context)?;
        }
        channel_controller.initialize(&context)?;

        Ok(AppInsightsCore {
            inner: Arc::new(CoreInner {
                config,
                logger,
                notifications,
                clock,
                extensions,
                chain,
                channel_controller,
                torn_down: AtomicBool::new(false),
            }),
        })
    }
}

/// Order extensions: initialization-only plugins first, then processing plugins by ascending
/// priority. Processing plugins in the channel band are split off as channels.
fn partition_extensions(
    mut extensions: Vec<Arc<dyn TelemetryPlugin>>,
) -> Result<(Vec<Arc<dyn TelemetryPlugin>>, Vec<Arc<dyn TelemetryPlugin>>), Error> {
    if let Some(invalid) = extensions.iter().find(|extension| {
        extension.kind() == PluginKind::InitOnly
            && extension.priority() >= CHANNEL_CONTROLLER_PRIORITY
    }) {
        return Err(Error::InvalidChannelPriority {
            identifier: invalid.identifier().to_string(),
            priority: invalid.priority(),
        });
    }

    extensions.sort_by_key(|extension| {
        (
            extension.kind() == PluginKind::Processing,
            extension.priority(),
        )
    });
    Ok(extensions
        .into_iter()
        .partition(|extension| extension.priority() < CHANNEL_CONTROLLER_PRIORITY))
}

fn warn_duplicate_priorities(logger: &DiagnosticLogger, extensions: &[Arc<dyn TelemetryPlugin>]) {
    let mut seen: HashMap<u32, &str> = HashMap::new();
    for extension in extensions {
        if let Some(other) = seen.insert(extension.priority(), extension.identifier()) {
            let message = InternalLogMessage::new(
                InternalMessageId::DuplicateExtensionPriority,
                &format!(
                    "Two extensions have same priority #{} - {}, {}",
                    extension.priority(),
                    other,
                    extension.identifier()
                ),
                true,
                None,
            );
            logger.warn_to_console(&message.message);
            logger.log_internal_message(LoggingSeverity::Warning, message);
        }
    }
}

#[derive(Debug)]
struct CoreInner {
    config: Arc<Config>,
    logger: Arc<DiagnosticLogger>,
    notifications: Arc<NotificationManager>,
    clock: Arc<dyn Clock>,
    extensions: Vec<Arc<dyn TelemetryPlugin>>,
    chain: Vec<Arc<dyn TelemetryPlugin>>,
    channel_controller: Arc<ChannelController>,
    torn_down: AtomicBool,
}

/// Validates telemetry and walks it through the ordered plugin chain.
///
/// The chain is fixed at construction, so tracking needs no locking and may happen from any
/// thread or reentrantly from within a plugin. Cloning is cheap and yields a handle to the same
/// pipeline.
#[derive(Debug, Clone)]
pub struct AppInsightsCore {
    inner: Arc<CoreInner>,
}

impl AppInsightsCore {
    /// Start building a pipeline.
    pub fn builder(config: Config) -> CoreBuilder {
        CoreBuilder {
            config,
            extensions: Vec::new(),
            channel_queues: Vec::new(),
            store: None,
            clock: None,
            console: None,
        }
    }

    /// Build a pipeline from `extensions`. At least one of them must be a channel.
    pub fn initialize(
        config: Config,
        extensions: Vec<Arc<dyn TelemetryPlugin>>,
    ) -> Result<Self, Error> {
        Self::initialize_with_channels(config, extensions, Vec::new())
    }

    /// Build a pipeline from `extensions` and explicit channel queues.
    pub fn initialize_with_channels(
        config: Config,
        extensions: Vec<Arc<dyn TelemetryPlugin>>,
        channel_queues: Vec<Vec<Arc<dyn TelemetryPlugin>>>,
    ) -> Result<Self, Error> {
        let mut builder = Self::builder(config);
        builder.extensions = extensions;
        builder.channel_queues = channel_queues;
        builder.build()
    }

    /// The validated configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The diagnostic logger of this instance.
    pub fn logger(&self) -> &Arc<DiagnosticLogger> {
        &self.inner.logger
    }

    /// Sent and discarded notifications.
    pub fn notifications(&self) -> &Arc<NotificationManager> {
        &self.inner.notifications
    }

    /// Register a notification listener.
    pub fn add_notification_listener(&self, listener: Arc<dyn NotificationListener>) {
        self.inner.notifications.add_listener(listener);
    }

    /// All extensions in initialization order, channels excluded.
    pub fn extensions(&self) -> &[Arc<dyn TelemetryPlugin>] {
        &self.inner.extensions
    }

    /// The channel stage.
    pub fn channel_controller(&self) -> &ChannelController {
        &self.inner.channel_controller
    }

    /// Identifiers of the processing chain, ending with the channel controller.
    pub fn chain_identifiers(&self) -> Vec<&str> {
        self.inner.chain.iter().map(|p| p.identifier()).collect()
    }

    /// Send `item` through the pipeline.
    ///
    /// A missing `time`, `i_key` or `ver` is filled in. An item without name or base type is
    /// reported to the discard listeners and rejected with [`Error::InvalidEvent`]. Errors of
    /// plugins are returned unchanged.
    pub fn track(&self, mut item: TelemetryItem) -> Result<(), Error> {
        let inner = &self.inner;
        if item.i_key.as_deref().map_or(true, str::is_empty) {
            item.i_key = Some(inner.config.instrumentation_key.clone());
        }
        if item.time.is_none() {
            item.time = Some(ms_to_time(inner.clock.now_ms()));
        }
        if item.ver.is_none() {
            item.ver = Some(DEFAULT_SCHEMA_VERSION.to_string());
        }

        if let Err(reason) = validate(&item) {
            inner
                .notifications
                .events_discarded(std::slice::from_ref(&item), DiscardReason::InvalidEvent);
            return Err(Error::InvalidEvent(reason));
        }

        if inner.torn_down.load(Ordering::SeqCst) {
            return Ok(());
        }
        NextPlugin::new(&inner.chain).process(&mut item)
    }

    /// Track every queued internal diagnostic as a `MessageData` item and empty the queue.
    pub fn poll_internal_logs(&self) -> Result<(), Error> {
        let mut result = Ok(());
        for message in self.inner.logger.drain_queue() {
            let item = TelemetryItem::new(
                format!("InternalMessageId: {}", message.message_id),
                Data::Message(MessageData {
                    ver: 2,
                    message: message.message,
                    severity_level: None,
                    properties: None,
                }),
            );
            let outcome = self.track(item);
            if result.is_ok() {
                result = outcome;
            }
        }
        result
    }

    /// Poll internal diagnostics every `diagnostic_log_interval_ms` on a background thread until
    /// the returned handle is cancelled or dropped.
    pub fn start_internal_log_poller(&self) -> InternalLogPoller {
        InternalLogPoller::start(
            self.clone(),
            Duration::from_millis(self.inner.config.diagnostic_log_interval_ms),
        )
    }

    /// Pause all channels.
    pub fn pause(&self) {
        self.inner.channel_controller.pause();
    }

    /// Resume all channels.
    pub fn resume(&self) {
        self.inner.channel_controller.resume();
    }

    /// Flush all channels, then call `callback`. Failures of single channels are logged.
    pub fn flush(
        &self,
        is_async: bool,
        callback: Option<Box<dyn FnOnce() + Send>>,
    ) -> Result<(), Error> {
        self.inner.channel_controller.flush(is_async)?;
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    /// Tear down every plugin in chain order. Later items are validated but not forwarded.
    pub fn teardown(&self) {
        if self.inner.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        for plugin in self.inner.extensions.iter() {
            plugin.teardown();
        }
        self.inner.channel_controller.teardown();
    }

    /// Whether [`teardown`](Self::teardown) was called.
    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.load(Ordering::SeqCst)
    }
}

fn validate(item: &TelemetryItem) -> Result<(), InvalidEventReason> {
    if item.name.is_empty() {
        return Err(InvalidEventReason::MissingName);
    }
    if item.time.is_none() {
        return Err(InvalidEventReason::MissingTimestamp);
    }
    if item.base_type().is_none() {
        return Err(InvalidEventReason::MissingBaseType);
    }
    if item.i_key.as_deref().map_or(true, str::is_empty) {
        return Err(InvalidEventReason::MissingInstrumentationKey);
    }
    Ok(())
}

#[derive(Debug)]
enum Message {
    Stop,
}

/// Handle of the background internal log poller. Dropping it stops the poller.
#[derive(Debug)]
pub struct InternalLogPoller {
    message_sender: mpsc::Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl InternalLogPoller {
    fn start(core: AppInsightsCore, interval: Duration) -> Self {
        let (message_sender, message_receiver) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match message_receiver.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Err(err) = core.poll_internal_logs() {
                        log::debug!("polling internal logs failed: {}", err);
                    }
                }
                Ok(Message::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });
        Self {
            message_sender,
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the poller thread to finish.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.message_sender.send(Message::Stop);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::debug!("internal log poller panicked");
            }
        }
    }
}

impl Drop for InternalLogPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plugin {
        id: &'static str,
        priority: u32,
        kind: PluginKind,
    }

    impl TelemetryPlugin for Plugin {
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
            Ok(())
        }
    }

    fn plugin(id: &'static str, priority: u32, kind: PluginKind) -> Arc<dyn TelemetryPlugin> {
        Arc::new(Plugin { id, priority, kind })
    }

    #[test]
    fn partition_orders_init_only_first() {
        let (extensions, band) = partition_extensions(vec![
            plugin("p50", 50, PluginKind::Processing),
            plugin("init90", 90, PluginKind::InitOnly),
            plugin("channel", 200, PluginKind::Processing),
            plugin("p10", 10, PluginKind::Processing),
            plugin("init5", 5, PluginKind::InitOnly),
        ])
        .unwrap();
        let ids: Vec<_> = extensions.iter().map(|e| e.identifier()).collect();
        assert_eq!(vec!["init5", "init90", "p10", "p50"], ids);
        assert_eq!("channel", band[0].identifier());
    }

    #[test]
    fn init_only_in_channel_band_is_rejected() {
        let err = partition_extensions(vec![plugin("bad", 100, PluginKind::InitOnly)]).unwrap_err();
        assert!(err.to_string().contains("Channel has invalid priority"));
    }

    #[test]
    fn validation_reasons() {
        let mut item = TelemetryItem::default();
        assert_eq!(Err(InvalidEventReason::MissingName), validate(&item));
        item.name = "x".into();
        assert_eq!(Err(InvalidEventReason::MissingTimestamp), validate(&item));
        item.time = Some(ms_to_time(0));
        assert_eq!(Err(InvalidEventReason::MissingBaseType), validate(&item));
        item.data = Some(Data::Message(MessageData {
            ver: 2,
            message: "m".into(),
            severity_level: None,
            properties: None,
        }));
        assert_eq!(
            Err(InvalidEventReason::MissingInstrumentationKey),
            validate(&item)
        );
        item.i_key = Some("key".into());
        assert_eq!(Ok(()), validate(&item));
    }
}
