//! Internal diagnostics of the SDK.
//!
//! Nothing the SDK does at runtime may take down the host application. Recoverable failures are
//! therefore reported to a [`DiagnosticLogger`], which rate-limits them, echoes some of them to a
//! console sink and queues the important ones so they can be sent as telemetry themselves.

use crate::{Config, Error};
use serde_json::Value;
use std::{
    any::Any,
    collections::HashSet,
    fmt::{self, Debug, Display},
    sync::{Mutex, MutexGuard, PoisonError},
};

const USER_ACTIONABLE_PREFIX: &str = "AI: ";
const NON_USER_ACTIONABLE_PREFIX: &str = "AI (Internal): ";
const THROTTLE_LIMIT_MESSAGE: &str =
    "Internal events throttle limit per PageView reached for this app.";

/// Severity of an internal diagnostic.
///
/// Configured logging levels are thresholds: level `1` lets critical messages through, level `2`
/// lets critical and warning messages through and level `0` lets nothing through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoggingSeverity {
    /// Something is broken and telemetry is being lost.
    Critical = 1,
    /// Something unexpected happened but the SDK coped.
    Warning = 2,
}

impl LoggingSeverity {
    fn passes(self, level: u8) -> bool {
        (self as u8) <= level
    }
}

/// Identifies the kind of an internal diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum InternalMessageId {
    BrowserDoesNotSupportLocalStorage,
    BrowserCannotReadLocalStorage,
    BrowserCannotWriteLocalStorage,
    BrowserCannotWriteCookie,
    ErrorParsingAISessionCookie,
    SessionRenewalDateIsZero,
    DuplicateExtensionPriority,
    NotificationException,
    PluginException,
    FlushFailed,
    TelemetryInitializerFailed,
    TelemetrySampledAndNotSent,
    SampleRateOutOfRange,
    SetAuthContextFailedAccountName,
    StartCalledMoreThanOnce,
    StopCalledWithoutStart,
    TrackEventFailed,
    TrackTraceFailed,
    TrackExceptionFailed,
    TrackMetricFailed,
    TrackPVFailed,
    TrackDependencyFailed,
    MessageLimitPerPVExceeded,
}

impl InternalMessageId {
    /// The stable name used in message texts and internal telemetry.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BrowserDoesNotSupportLocalStorage => "BrowserDoesNotSupportLocalStorage",
            Self::BrowserCannotReadLocalStorage => "BrowserCannotReadLocalStorage",
            Self::BrowserCannotWriteLocalStorage => "BrowserCannotWriteLocalStorage",
            Self::BrowserCannotWriteCookie => "BrowserCannotWriteCookie",
            Self::ErrorParsingAISessionCookie => "ErrorParsingAISessionCookie",
            Self::SessionRenewalDateIsZero => "SessionRenewalDateIsZero",
            Self::DuplicateExtensionPriority => "DuplicateExtensionPriority",
            Self::NotificationException => "NotificationException",
            Self::PluginException => "PluginException",
            Self::FlushFailed => "FlushFailed",
            Self::TelemetryInitializerFailed => "TelemetryInitializerFailed",
            Self::TelemetrySampledAndNotSent => "TelemetrySampledAndNotSent",
            Self::SampleRateOutOfRange => "SampleRateOutOfRange",
            Self::SetAuthContextFailedAccountName => "SetAuthContextFailedAccountName",
            Self::StartCalledMoreThanOnce => "StartCalledMoreThanOnce",
            Self::StopCalledWithoutStart => "StopCalledWithoutStart",
            Self::TrackEventFailed => "TrackEventFailed",
            Self::TrackTraceFailed => "TrackTraceFailed",
            Self::TrackExceptionFailed => "TrackExceptionFailed",
            Self::TrackMetricFailed => "TrackMetricFailed",
            Self::TrackPVFailed => "TrackPVFailed",
            Self::TrackDependencyFailed => "TrackDependencyFailed",
            Self::MessageLimitPerPVExceeded => "MessageLimitPerPVExceeded",
        }
    }
}

impl Display for InternalMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A formatted internal diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct InternalLogMessage {
    /// Kind of the diagnostic.
    pub message_id: InternalMessageId,
    /// Full text, including prefix, message id, message and properties.
    pub message: String,
}

impl InternalLogMessage {
    /// Format a diagnostic.
    pub fn new(
        message_id: InternalMessageId,
        msg: &str,
        is_user_actionable: bool,
        properties: Option<&Value>,
    ) -> Self {
        let mut message = String::from(if is_user_actionable {
            USER_ACTIONABLE_PREFIX
        } else {
            NON_USER_ACTIONABLE_PREFIX
        });
        message.push_str(message_id.as_str());
        if !msg.is_empty() {
            message.push_str(" message:");
            message.push_str(&sanitize_diagnostic_text(msg));
        }
        if let Some(properties) = properties {
            message.push_str(" props:");
            message.push_str(&sanitize_diagnostic_text(&properties.to_string()));
        }
        Self {
            message_id,
            message,
        }
    }
}

impl Display for InternalLogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn sanitize_diagnostic_text(text: &str) -> String {
    text.replace('"', "")
}

/// Where echoed diagnostics end up.
pub trait ConsoleSink: Debug + Send + Sync {
    /// Print a warning.
    fn warn(&self, message: &str);
}

/// Echoes diagnostics through the [`log`] facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConsole;

impl ConsoleSink for LogConsole {
    fn warn(&self, message: &str) {
        log::warn!("{}", message);
    }
}

#[derive(Debug, Default)]
struct LoggerState {
    queue: Vec<InternalLogMessage>,
    message_count: usize,
    console_logged: HashSet<InternalMessageId>,
    queue_logged: HashSet<InternalMessageId>,
}

/// Throttled internal logger shared by every component of one SDK instance.
#[derive(Debug)]
pub struct DiagnosticLogger {
    enable_debug_exceptions: bool,
    verbose_logging: bool,
    logging_level_console: u8,
    logging_level_telemetry: u8,
    max_internal_message_limit: usize,
    console: Box<dyn ConsoleSink>,
    state: Mutex<LoggerState>,
}

impl DiagnosticLogger {
    /// Create a logger that echoes to the [`log`] facade.
    pub fn new(config: &Config) -> Self {
        Self::with_console(config, Box::new(LogConsole))
    }

    /// Create a logger that echoes to `console`.
    pub fn with_console(config: &Config, console: Box<dyn ConsoleSink>) -> Self {
        Self {
            enable_debug_exceptions: config.enable_debug_exceptions,
            verbose_logging: config.verbose_logging,
            logging_level_console: config.logging_level_console,
            logging_level_telemetry: config.logging_level_telemetry,
            max_internal_message_limit: config.max_internal_message_limit,
            console,
            state: Mutex::new(LoggerState::default()),
        }
    }

    /// Whether diagnostics are raised as errors instead of logged.
    pub fn enable_debug_exceptions(&self) -> bool {
        self.enable_debug_exceptions
    }

    /// Report an internal diagnostic.
    ///
    /// With debug exceptions enabled this returns the diagnostic as [`Error::Diagnostic`] and
    /// logs nothing. Otherwise it never fails.
    pub fn throw_internal(
        &self,
        severity: LoggingSeverity,
        message_id: InternalMessageId,
        msg: &str,
        properties: Option<Value>,
        is_user_actionable: bool,
    ) -> Result<(), Error> {
        let message =
            InternalLogMessage::new(message_id, msg, is_user_actionable, properties.as_ref());
        if self.enable_debug_exceptions {
            return Err(Error::Diagnostic(message));
        }

        let echo = {
            let mut state = self.lock();
            let wanted = self.verbose_logging
                || is_user_actionable
                || severity.passes(self.logging_level_console);
            // Each message id reaches the console once per reset cycle unless logging verbosely.
            let first = state.console_logged.insert(message_id);
            wanted && (first || self.verbose_logging)
        };
        if echo {
            self.warn_to_console(&message.message);
        }

        self.log_internal_message(severity, message);
        Ok(())
    }

    /// Shorthand for a non user actionable warning.
    pub fn warn_internal(&self, message_id: InternalMessageId, msg: &str) -> Result<(), Error> {
        self.throw_internal(LoggingSeverity::Warning, message_id, msg, None, false)
    }

    /// Shorthand for a non user actionable critical diagnostic.
    pub fn critical_internal(
        &self,
        message_id: InternalMessageId,
        msg: &str,
        properties: Option<Value>,
    ) -> Result<(), Error> {
        self.throw_internal(LoggingSeverity::Critical, message_id, msg, properties, false)
    }

    /// Print `message` to the console sink, unconditionally.
    pub fn warn_to_console(&self, message: &str) {
        self.console.warn(message);
    }

    /// Queue `message` for internal telemetry, subject to the throttle.
    pub fn log_internal_message(&self, severity: LoggingSeverity, message: InternalLogMessage) {
        let limit_reached = {
            let mut state = self.lock();
            if state.message_count >= self.max_internal_message_limit {
                return;
            }
            if !self.verbose_logging && !severity.passes(self.logging_level_telemetry) {
                return;
            }
            // An id is only marked once it has actually been queued.
            if !state.queue_logged.insert(message.message_id) {
                return;
            }
            state.queue.push(message);
            state.message_count += 1;
            if state.message_count == self.max_internal_message_limit {
                state.queue.push(InternalLogMessage::new(
                    InternalMessageId::MessageLimitPerPVExceeded,
                    THROTTLE_LIMIT_MESSAGE,
                    false,
                    None,
                ));
                true
            } else {
                false
            }
        };
        if limit_reached {
            self.warn_to_console(THROTTLE_LIMIT_MESSAGE);
        }
    }

    /// Start a new throttle cycle: the count and the record of logged message ids are reset.
    pub fn reset_internal_message_count(&self) {
        let mut state = self.lock();
        state.message_count = 0;
        state.console_logged.clear();
        state.queue_logged.clear();
    }

    /// Forget which message ids were already logged, keeping the count.
    pub fn clear_internal_message_logged_types(&self) {
        let mut state = self.lock();
        state.console_logged.clear();
        state.queue_logged.clear();
    }

    /// Number of messages queued in the current throttle cycle.
    pub fn message_count(&self) -> usize {
        self.lock().message_count
    }

    /// A copy of the queued messages.
    pub fn queue(&self) -> Vec<InternalLogMessage> {
        self.lock().queue.clone()
    }

    /// Take all queued messages.
    pub fn drain_queue(&self) -> Vec<InternalLogMessage> {
        std::mem::take(&mut self.lock().queue)
    }

    fn lock(&self) -> MutexGuard<'_, LoggerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".into()
    }
}
