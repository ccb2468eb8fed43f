//! The public tracking API.

use crate::{
    clock::{Clock, SystemClock},
    convert::{ms_to_time_span, new_span_id},
    diagnostics::{panic_message, ConsoleSink, InternalMessageId, LoggingSeverity},
    models::{
        context_tag_keys::TAG_KEY_LOOKUP, Data, DataPoint, DataPointType, EventData, ExceptionData,
        ExceptionDetails, Measurements, MessageData, MetricData, PageViewData, Properties,
        RemoteDependencyData, Sanitize, SeverityLevel, Tags, TelemetryItem,
    },
    orchestrator::{AppInsightsCore, CoreBuilder},
    plugin::TelemetryPlugin,
    properties::PropertiesPlugin,
    storage::PersistenceStore,
    Config, Error,
};
use serde_json::json;
use std::{
    collections::HashMap,
    error::Error as StdError,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

const ENVELOPE_NAME_PREFIX: &str = "Microsoft.ApplicationInsights.{0}.";

/// A named custom event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTelemetry {
    /// Event name.
    pub name: String,
    /// Custom properties. Keys naming a known `ai.*` context tag are also set as tags.
    pub properties: Option<Properties>,
    /// Custom measurements.
    pub measurements: Option<Measurements>,
}

impl EventTelemetry {
    /// Create an event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a custom property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties
            .get_or_insert_with(Properties::new)
            .insert(key.into(), value.into());
        self
    }

    /// Add a custom measurement.
    pub fn with_measurement(mut self, key: impl Into<String>, value: f64) -> Self {
        self.measurements
            .get_or_insert_with(Measurements::new)
            .insert(key.into(), value);
        self
    }
}

/// A trace message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TraceTelemetry {
    /// Message text.
    pub message: String,
    /// Severity.
    pub severity_level: Option<SeverityLevel>,
    /// Custom properties.
    pub properties: Option<Properties>,
}

impl TraceTelemetry {
    /// Create a trace message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Set the severity.
    pub fn with_severity(mut self, severity_level: SeverityLevel) -> Self {
        self.severity_level = Some(severity_level);
        self
    }
}

/// An exception, possibly with its chain of causes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExceptionTelemetry {
    /// The exception followed by its causes.
    pub exceptions: Vec<ExceptionDetails>,
    /// Severity.
    pub severity_level: Option<SeverityLevel>,
    /// Custom properties.
    pub properties: Option<Properties>,
    /// Custom measurements.
    pub measurements: Option<Measurements>,
}

impl ExceptionTelemetry {
    /// Create an exception with a single entry.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exceptions: vec![ExceptionDetails {
                type_name: type_name.into(),
                message: message.into(),
                has_full_stack: false,
                stack: None,
            }],
            ..Default::default()
        }
    }

    /// Describe `err` and every error in its [`source`](StdError::source) chain.
    pub fn from_error<E: StdError + 'static>(err: &E) -> Self {
        let mut exceptions = vec![ExceptionDetails {
            type_name: std::any::type_name::<E>().to_string(),
            message: err.to_string(),
            has_full_stack: false,
            stack: None,
        }];
        let mut source = err.source();
        while let Some(cause) = source {
            exceptions.push(ExceptionDetails {
                type_name: "<cause>".into(),
                message: cause.to_string(),
                has_full_stack: false,
                stack: None,
            });
            source = cause.source();
        }
        Self {
            exceptions,
            ..Default::default()
        }
    }
}

/// A metric value, or an aggregation of several values when `sample_count` is above one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricTelemetry {
    /// Metric name.
    pub name: String,
    /// Metric namespace.
    pub namespace: Option<String>,
    /// The value, or the average of the aggregated values.
    pub average: f64,
    /// Number of aggregated values.
    pub sample_count: Option<i32>,
    /// Smallest aggregated value.
    pub min: Option<f64>,
    /// Largest aggregated value.
    pub max: Option<f64>,
    /// Standard deviation of the aggregated values.
    pub std_dev: Option<f64>,
    /// Custom properties.
    pub properties: Option<Properties>,
}

impl MetricTelemetry {
    /// Create a single measurement.
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            average: value,
            ..Default::default()
        }
    }
}

/// A page view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageViewTelemetry {
    /// Page name.
    pub name: String,
    /// Page url.
    pub uri: Option<String>,
    /// Page view id. A new id is generated when missing.
    pub id: Option<String>,
    /// Time it took to load the page.
    pub duration_ms: Option<f64>,
    /// Custom properties.
    pub properties: Option<Properties>,
    /// Custom measurements.
    pub measurements: Option<Measurements>,
}

impl PageViewTelemetry {
    /// Create a page view.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the page url.
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }
}

/// A call to a remote component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyTelemetry {
    /// Dependency name, e.g. `GET /api/users`.
    pub name: String,
    /// Dependency id. A new id is generated when missing.
    pub id: Option<String>,
    /// Called host.
    pub target: Option<String>,
    /// Command, e.g. the full url.
    pub data: Option<String>,
    /// Dependency type, e.g. `Ajax`.
    pub dependency_type: Option<String>,
    /// Result code, e.g. the HTTP status.
    pub result_code: Option<String>,
    /// Duration of the call.
    pub duration_ms: f64,
    /// Whether the call succeeded.
    pub success: Option<bool>,
    /// Custom properties.
    pub properties: Option<Properties>,
    /// Custom measurements.
    pub measurements: Option<Measurements>,
}

/// Builds an [`ApplicationInsights`] instance.
#[derive(Debug)]
pub struct ApplicationInsightsBuilder {
    core: CoreBuilder,
    channels: Vec<Arc<dyn TelemetryPlugin>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ApplicationInsightsBuilder {
    /// Persist cookies and local storage in `store`. Defaults to a
    /// [`MemoryStore`](crate::MemoryStore).
    pub fn with_store(mut self, store: Arc<dyn PersistenceStore>) -> Self {
        self.core = self.core.with_store(store);
        self
    }

    /// Read time from `clock`. Defaults to the [`SystemClock`].
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Add an extension to the processing chain.
    pub fn with_extension(mut self, extension: Arc<dyn TelemetryPlugin>) -> Self {
        self.core = self.core.with_extension(extension);
        self
    }

    /// Add a channel to the first channel queue.
    pub fn with_channel(mut self, channel: Arc<dyn TelemetryPlugin>) -> Self {
        self.channels.push(channel);
        self
    }

    /// Echo diagnostics to `console`.
    pub fn with_console(mut self, console: Box<dyn ConsoleSink>) -> Self {
        self.core = self.core.with_console(console);
        self
    }

    /// Build the pipeline with the [`PropertiesPlugin`] in front of all extensions.
    pub fn build(self) -> Result<ApplicationInsights, Error> {
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let properties = Arc::new(PropertiesPlugin::new());
        let mut core = self
            .core
            .with_clock(clock.clone())
            .with_extension(properties.clone());
        if !self.channels.is_empty() {
            core = core.with_channel_queue(self.channels);
        }
        Ok(ApplicationInsights {
            core: core.build()?,
            properties,
            clock,
            timers: Arc::default(),
        })
    }
}

#[derive(Debug, Default)]
struct Timers {
    events: HashMap<String, i64>,
    pages: HashMap<String, i64>,
}

/// Tracks telemetry through an [`AppInsightsCore`] with the [`PropertiesPlugin`] installed.
///
/// Tracking never fails in production: failures are reported to the diagnostic logger. With
/// debug exceptions enabled the failure is returned instead.
///
/// ```
/// use application_insights_sdk::{ApplicationInsights, Config, EventTelemetry};
/// # use application_insights_sdk::{Error, PluginContext, TelemetryPlugin};
/// # #[derive(Debug)]
/// # struct Sender;
/// # impl TelemetryPlugin for Sender {
/// #     fn identifier(&self) -> &str { "Sender" }
/// #     fn priority(&self) -> u32 { 1000 }
/// #     fn initialize(&self, _: &PluginContext) -> Result<(), Error> { Ok(()) }
/// # }
/// # let sender = std::sync::Arc::new(Sender);
///
/// let ai = ApplicationInsights::builder(Config::new("0fdcec70-0ce5-4085-89d9-9ae8ead9af66"))
///     .with_channel(sender)
///     .build()
///     .unwrap();
/// ai.track_event(EventTelemetry::new("clicked").with_property("button", "save"))
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ApplicationInsights {
    core: AppInsightsCore,
    properties: Arc<PropertiesPlugin>,
    clock: Arc<dyn Clock>,
    timers: Arc<Mutex<Timers>>,
}

impl ApplicationInsights {
    /// Start building an instance.
    pub fn builder(config: Config) -> ApplicationInsightsBuilder {
        ApplicationInsightsBuilder {
            core: AppInsightsCore::builder(config),
            channels: Vec::new(),
            clock: None,
        }
    }

    /// The underlying pipeline.
    pub fn core(&self) -> &AppInsightsCore {
        &self.core
    }

    /// The properties stage.
    pub fn properties(&self) -> &Arc<PropertiesPlugin> {
        &self.properties
    }

    /// Track a custom event.
    pub fn track_event(&self, event: EventTelemetry) -> Result<(), Error> {
        let data = Data::Event(EventData {
            ver: 2,
            name: event.name,
            properties: event.properties,
            measurements: event.measurements,
        });
        self.dispatch(InternalMessageId::TrackEventFailed, "trackEvent", "Event", data)
    }

    /// Track a trace message.
    pub fn track_trace(&self, trace: TraceTelemetry) -> Result<(), Error> {
        let data = Data::Message(MessageData {
            ver: 2,
            message: trace.message,
            severity_level: trace.severity_level,
            properties: trace.properties,
        });
        self.dispatch(InternalMessageId::TrackTraceFailed, "trackTrace", "Message", data)
    }

    /// Track an exception.
    pub fn track_exception(&self, exception: ExceptionTelemetry) -> Result<(), Error> {
        let data = Data::Exception(ExceptionData {
            ver: 2,
            exceptions: exception.exceptions,
            severity_level: exception.severity_level,
            properties: exception.properties,
            measurements: exception.measurements,
        });
        self.dispatch(
            InternalMessageId::TrackExceptionFailed,
            "trackException",
            "Exception",
            data,
        )
    }

    /// Track a metric. Metrics are never sampled out.
    pub fn track_metric(&self, metric: MetricTelemetry) -> Result<(), Error> {
        let kind = match metric.sample_count {
            Some(count) if count > 1 => DataPointType::Aggregation {
                count: Some(count),
                min: metric.min,
                max: metric.max,
                std_dev: metric.std_dev,
            },
            _ => DataPointType::Measurement,
        };
        let data = Data::Metric(MetricData {
            ver: 2,
            metrics: vec![DataPoint {
                ns: metric.namespace,
                name: metric.name,
                kind,
                value: metric.average,
            }],
            properties: metric.properties,
        });
        self.dispatch(InternalMessageId::TrackMetricFailed, "trackMetric", "Metric", data)
    }

    /// Track a page view. A page view starts a new throttle cycle of the diagnostic logger.
    pub fn track_page_view(&self, page_view: PageViewTelemetry) -> Result<(), Error> {
        let data = Data::PageView(PageViewData {
            ver: 2,
            name: page_view.name,
            url: page_view.uri,
            duration: page_view.duration_ms.map(ms_to_time_span),
            id: Some(page_view.id.unwrap_or_else(new_span_id)),
            properties: page_view.properties,
            measurements: page_view.measurements,
        });
        let result = self.dispatch(
            InternalMessageId::TrackPVFailed,
            "trackPageView",
            "Pageview",
            data,
        );
        self.core.logger().reset_internal_message_count();
        result
    }

    /// Track a call to a remote component.
    pub fn track_dependency_data(&self, dependency: DependencyTelemetry) -> Result<(), Error> {
        let data = Data::RemoteDependency(RemoteDependencyData {
            ver: 2,
            name: dependency.name,
            id: Some(dependency.id.unwrap_or_else(new_span_id)),
            result_code: dependency.result_code,
            duration: ms_to_time_span(dependency.duration_ms),
            success: dependency.success,
            data: dependency.data,
            target: dependency.target,
            type_: dependency.dependency_type,
            properties: dependency.properties,
            measurements: dependency.measurements,
        });
        self.dispatch(
            InternalMessageId::TrackDependencyFailed,
            "trackDependencyData",
            "RemoteDependency",
            data,
        )
    }

    /// Start timing the event `name`. Tracked by [`stop_track_event`](Self::stop_track_event).
    pub fn start_track_event(&self, name: &str) -> Result<(), Error> {
        self.start_timer(name, |timers| &mut timers.events)
    }

    /// Stop timing the event `name` and track it with the elapsed milliseconds in the
    /// `duration` property.
    pub fn stop_track_event(
        &self,
        name: &str,
        properties: Option<Properties>,
        measurements: Option<Measurements>,
    ) -> Result<(), Error> {
        let Some(duration) = self.stop_timer(name, |timers| &mut timers.events)? else {
            return Ok(());
        };
        let mut properties = properties.unwrap_or_default();
        properties.insert("duration".into(), duration.to_string());
        self.track_event(EventTelemetry {
            name: name.to_string(),
            properties: Some(properties),
            measurements,
        })
    }

    /// Start timing the page view `name`. Tracked by [`stop_track_page`](Self::stop_track_page).
    pub fn start_track_page(&self, name: &str) -> Result<(), Error> {
        self.start_timer(name, |timers| &mut timers.pages)
    }

    /// Stop timing the page view `name` and track it with the elapsed time as duration.
    pub fn stop_track_page(
        &self,
        name: &str,
        uri: Option<&str>,
        properties: Option<Properties>,
        measurements: Option<Measurements>,
    ) -> Result<(), Error> {
        let Some(duration) = self.stop_timer(name, |timers| &mut timers.pages)? else {
            return Ok(());
        };
        self.track_page_view(PageViewTelemetry {
            name: name.to_string(),
            uri: uri.map(str::to_string),
            id: None,
            duration_ms: Some(duration as f64),
            properties,
            measurements,
        })
    }

    /// Register a telemetry initializer. Returning `false` drops the item.
    pub fn add_telemetry_initializer(
        &self,
        initializer: impl Fn(&mut TelemetryItem) -> bool + Send + Sync + 'static,
    ) {
        self.properties.add_telemetry_initializer(Arc::new(initializer));
    }

    /// Set the authenticated user, see
    /// [`UserContext::set_authenticated_user_context`](crate::context::UserContext::set_authenticated_user_context).
    pub fn set_authenticated_user_context(
        &self,
        authenticated_user_id: &str,
        account_id: Option<&str>,
        store_in_cookie: bool,
    ) -> Result<(), Error> {
        self.properties
            .with_context(|context| {
                context.user.set_authenticated_user_context(
                    authenticated_user_id,
                    account_id,
                    store_in_cookie,
                )
            })
            .unwrap_or(Ok(()))
    }

    /// Forget the authenticated user.
    pub fn clear_authenticated_user_context(&self) {
        self.properties
            .with_context(|context| context.user.clear_authenticated_user_context());
    }

    /// Flush all channels.
    pub fn flush(&self, is_async: bool) -> Result<(), Error> {
        self.core.flush(is_async, None)
    }

    /// Track queued internal diagnostics.
    pub fn poll_internal_logs(&self) -> Result<(), Error> {
        self.core.poll_internal_logs()
    }

    /// Tear down the pipeline. The automatic session is backed up to local storage.
    pub fn teardown(&self) {
        self.core.teardown();
    }

    fn dispatch(
        &self,
        message_id: InternalMessageId,
        operation: &str,
        envelope_type: &str,
        data: Data,
    ) -> Result<(), Error> {
        let mut item =
            TelemetryItem::new(format!("{}{}", ENVELOPE_NAME_PREFIX, envelope_type), data);
        promote_tags(&mut item);
        item.sanitize();

        let logger = self.core.logger();
        let err = match catch_unwind(AssertUnwindSafe(|| self.core.track(item))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(panic) => {
                let panic = panic_message(panic.as_ref());
                return logger.throw_internal(
                    LoggingSeverity::Critical,
                    message_id,
                    &format!(
                        "{} failed, {} will not be collected: {}",
                        operation, envelope_type, panic
                    ),
                    Some(json!({ "exception": panic })),
                    false,
                );
            }
        };
        if logger.enable_debug_exceptions() {
            return Err(err);
        }
        logger.throw_internal(
            LoggingSeverity::Critical,
            message_id,
            &format!(
                "{} failed, {} will not be collected: {}",
                operation, envelope_type, err
            ),
            Some(json!({ "exception": format!("{:?}", err) })),
            false,
        )
    }

    fn lock_timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_timer(
        &self,
        name: &str,
        timers: impl FnOnce(&mut Timers) -> &mut HashMap<String, i64>,
    ) -> Result<(), Error> {
        let now = self.clock.now_ms();
        let already_started = {
            let mut guard = self.lock_timers();
            let timers = timers(&mut *guard);
            if timers.contains_key(name) {
                true
            } else {
                timers.insert(name.to_string(), now);
                false
            }
        };
        if already_started {
            return self.core.logger().throw_internal(
                LoggingSeverity::Warning,
                InternalMessageId::StartCalledMoreThanOnce,
                "start was called more than once for this event without calling stop.",
                Some(json!({ "name": name })),
                true,
            );
        }
        Ok(())
    }

    /// Elapsed milliseconds since the matching start. `None` if there was none.
    fn stop_timer(
        &self,
        name: &str,
        timers: impl FnOnce(&mut Timers) -> &mut HashMap<String, i64>,
    ) -> Result<Option<i64>, Error> {
        let started = timers(&mut *self.lock_timers()).remove(name);
        match started {
            Some(started) => Ok(Some((self.clock.now_ms() - started).max(0))),
            None => {
                self.core.logger().throw_internal(
                    LoggingSeverity::Warning,
                    InternalMessageId::StopCalledWithoutStart,
                    "stop was called without a corresponding start.",
                    Some(json!({ "name": name })),
                    true,
                )?;
                Ok(None)
            }
        }
    }
}

/// Copy custom properties named like a known context tag into the tags of `item`.
fn promote_tags(item: &mut TelemetryItem) {
    let Some(properties) = item.data.as_ref().and_then(Data::properties) else {
        return;
    };
    let promoted: Tags = properties
        .iter()
        .filter(|(key, _)| key.starts_with("ai."))
        .filter_map(|(key, value)| {
            TAG_KEY_LOOKUP
                .get(key.as_str())
                .map(|tag| (*tag, value.clone()))
        })
        .collect();
    for (key, value) in promoted.iter() {
        item.tags.insert(key, value);
    }
}
