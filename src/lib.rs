//! Client-side [Azure Application Insights] telemetry SDK.
//!
//! [Azure Application Insights]: https://docs.microsoft.com/en-us/azure/azure-monitor/app/app-insights-overview
//!
//! **Disclaimer**: This is not an official Microsoft product.
//!
//! The SDK enriches telemetry with context (user, session, device, operation and more), samples
//! it and walks it through an ordered chain of plugins that ends in one or more channels. It
//! does not transmit anything itself: sending is the job of a channel plugin provided by the
//! host.
//!
//! # Usage
//!
//! Build an [`ApplicationInsights`] instance with at least one channel and track telemetry:
//!
//! ```rust
//! use application_insights_sdk::{
//!     ApplicationInsights, Config, Error, EventTelemetry, NextPlugin, PluginContext,
//!     TelemetryItem, TelemetryPlugin,
//! };
//! use std::sync::Arc;
//!
//! #[derive(Debug)]
//! struct StdoutChannel;
//!
//! impl TelemetryPlugin for StdoutChannel {
//!     fn identifier(&self) -> &str {
//!         "StdoutChannel"
//!     }
//!
//!     fn priority(&self) -> u32 {
//!         1000
//!     }
//!
//!     fn initialize(&self, _context: &PluginContext) -> Result<(), Error> {
//!         Ok(())
//!     }
//!
//!     fn process_telemetry(
//!         &self,
//!         item: &mut TelemetryItem,
//!         next: NextPlugin<'_>,
//!     ) -> Result<(), Error> {
//!         println!("{}", serde_json::to_string(item).unwrap());
//!         next.process(item)
//!     }
//! }
//!
//! let ai = ApplicationInsights::builder(Config::new("0fdcec70-0ce5-4085-89d9-9ae8ead9af66"))
//!     .with_channel(Arc::new(StdoutChannel))
//!     .build()?;
//! ai.track_event(EventTelemetry::new("app started"))?;
//! # Ok::<(), Error>(())
//! ```
//!
//! # Pipeline
//!
//! Every item passes through these stages:
//!
//! 1. [`AppInsightsCore::track`] fills in missing time, instrumentation key and schema version
//!    and rejects items without name or base type.
//! 2. Extensions with a priority below [`CHANNEL_CONTROLLER_PRIORITY`] in ascending priority
//!    order. The [`PropertiesPlugin`] (priority 10) adds the context tags, runs the telemetry
//!    initializers and samples.
//! 3. The [`ChannelController`], which hands the item to every channel queue.
//!
//! Any stage may drop an item by not calling [`NextPlugin::process`].
//!
//! # Context tags
//!
//! | Provider                 | Tags                                                         |
//! | ------------------------ | ------------------------------------------------------------ |
//! | Session                  | `ai.session.id`, `ai.session.isFirst`                        |
//! | [`ApplicationContext`]   | `ai.application.ver`, `ai.application.build`                 |
//! | [`DeviceContext`]        | `ai.device.*`                                                |
//! | [`InternalContext`]      | `ai.internal.sdkVersion`, `ai.internal.agentVersion`         |
//! | [`LocationContext`]      | `ai.location.ip`                                             |
//! | [`OperationContext`]     | `ai.operation.*`                                             |
//! | [`UserContext`]          | `ai.user.id`, `ai.user.authUserId`, `ai.user.accountId`      |
//!
//! Tags already present on an item are never overwritten. Custom properties named like a known
//! tag (e.g. `ai.operation.name`) are copied into the tags by the tracking API.
//!
//! [`ApplicationContext`]: context::ApplicationContext
//! [`DeviceContext`]: context::DeviceContext
//! [`InternalContext`]: context::InternalContext
//! [`LocationContext`]: context::LocationContext
//! [`OperationContext`]: context::OperationContext
//! [`UserContext`]: context::UserContext
//!
//! # Diagnostics
//!
//! Runtime failures never surface as errors. They are reported to the [`DiagnosticLogger`],
//! echoed through the [`log`] facade according to the configured levels and queued for
//! [`AppInsightsCore::poll_internal_logs`]. Set [`Config::enable_debug_exceptions`] to get them
//! returned as [`Error::Diagnostic`] instead.
#![doc(html_root_url = "https://docs.rs/application-insights-sdk/0.1.0")]
#![deny(missing_docs, unreachable_pub, missing_debug_implementations)]

mod analytics;
mod channel_controller;
mod clock;
mod config;
mod connection_string;
pub mod context;
mod convert;
mod diagnostics;
mod error;
mod models;
mod notification;
mod orchestrator;
mod plugin;
mod properties;
pub mod sampling;
pub mod session;
mod storage;

pub use analytics::{
    ApplicationInsights, ApplicationInsightsBuilder, DependencyTelemetry, EventTelemetry,
    ExceptionTelemetry, MetricTelemetry, PageViewTelemetry, TraceTelemetry,
};
pub use channel_controller::ChannelController;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, DEFAULT_SESSION_EXPIRATION_MS, DEFAULT_SESSION_RENEWAL_MS};
pub use connection_string::ConnectionStringError;
pub use diagnostics::{
    ConsoleSink, DiagnosticLogger, InternalLogMessage, InternalMessageId, LogConsole,
    LoggingSeverity,
};
pub use error::{Error, InvalidEventReason, Result};
pub use models::{
    context_tag_keys as tags, ContextTagKey, Data, DataPoint, DataPointType, EventData,
    ExceptionData, ExceptionDetails, Measurements, MessageData, MetricData, PageViewData,
    Properties, RemoteDependencyData, SeverityLevel, Tags, TelemetryItem, NAME_PLACEHOLDER,
};
pub use notification::{DiscardReason, NotificationListener, NotificationManager};
pub use orchestrator::{AppInsightsCore, CoreBuilder, InternalLogPoller, DEFAULT_SCHEMA_VERSION};
pub use plugin::{
    NextPlugin, PluginContext, PluginKind, TelemetryPlugin, CHANNEL_CONTROLLER_PRIORITY,
};
pub use properties::{PropertiesPlugin, TelemetryInitializer, PROPERTIES_PLUGIN_IDENTIFIER};
pub use storage::{MemoryStore, PersistenceStore, StoreTier};

#[cfg(doctest)]
doc_comment::doctest!("../README.md", readme);
