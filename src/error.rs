use crate::{connection_string::ConnectionStringError, diagnostics::InternalLogMessage};
use std::error::Error as StdError;

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the SDK.
///
/// Configuration errors are fatal: the SDK is unusable until they are corrected. Everything that
/// can happen at runtime (storage unavailable, an initializer failed, an item was sampled out) is
/// reported through the [`DiagnosticLogger`](crate::DiagnosticLogger) instead and only surfaces
/// here when debug exceptions are enabled.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The configuration does not contain an instrumentation key, neither directly nor through a
    /// connection string.
    #[error("please provide instrumentation key")]
    MissingInstrumentationKey,

    /// The connection string could not be parsed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    /// The JSON configuration could not be deserialized.
    #[error("invalid configuration: {0}")]
    InvalidConfig(serde_json::Error),

    /// The environment variable holding the connection string is not set.
    #[error("environment variable {0} is not set")]
    MissingEnvironmentVariable(&'static str),

    /// No extensions were passed to the orchestrator.
    #[error("at least one extension must be provided")]
    NoExtensions,

    /// No extension or channel queue provides a channel. Without a channel telemetry would never
    /// leave the pipeline.
    #[error("at least one channel must be provided")]
    NoChannels,

    /// A plugin in the channel band does not process telemetry, or a channel queue member has a
    /// priority below the channel band.
    #[error("Channel has invalid priority: {identifier} ({priority})")]
    InvalidChannelPriority {
        /// Identifier of the offending plugin.
        identifier: String,
        /// Its priority.
        priority: u32,
    },

    /// The telemetry item handed to [`AppInsightsCore::track`](crate::AppInsightsCore::track) is
    /// missing a required field. Discard listeners have been notified.
    #[error("invalid telemetry item: {0}")]
    InvalidEvent(InvalidEventReason),

    /// An internal diagnostic raised while debug exceptions are enabled.
    #[error("{0}")]
    Diagnostic(InternalLogMessage),

    /// A plugin failed to initialize or to process an item.
    #[error("plugin {identifier} failed with {source}")]
    Plugin {
        /// Identifier of the failing plugin.
        identifier: String,
        /// The underlying failure.
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

/// The required field a telemetry item was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidEventReason {
    /// `name` is missing or empty.
    MissingName,
    /// `time` is missing.
    MissingTimestamp,
    /// `baseType` is missing.
    MissingBaseType,
    /// `iKey` is missing or empty.
    MissingInstrumentationKey,
}

impl std::fmt::Display for InvalidEventReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InvalidEventReason::MissingName => "telemetry name required",
            InvalidEventReason::MissingTimestamp => "telemetry timestamp required",
            InvalidEventReason::MissingBaseType => "telemetry baseType required",
            InvalidEventReason::MissingInstrumentationKey => "telemetry iKey required",
        })
    }
}

impl Error {
    /// Wrap an arbitrary failure of the plugin `identifier`.
    pub fn plugin(
        identifier: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Error::Plugin {
            identifier: identifier.into(),
            source: source.into(),
        }
    }

    /// Whether the error makes the SDK unusable until the configuration is corrected.
    pub fn is_fatal_config(&self) -> bool {
        matches!(
            self,
            Error::MissingInstrumentationKey
                | Error::InvalidConnectionString(_)
                | Error::InvalidConfig(_)
                | Error::MissingEnvironmentVariable(_)
                | Error::NoExtensions
                | Error::NoChannels
                | Error::InvalidChannelPriority { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_priority_message() {
        let err = Error::InvalidChannelPriority {
            identifier: "sender".into(),
            priority: 5,
        };
        assert!(err.to_string().contains("Channel has invalid priority"));
        assert!(err.is_fatal_config());
    }

    #[test]
    fn invalid_event_is_not_config() {
        let err = Error::InvalidEvent(InvalidEventReason::MissingBaseType);
        assert_eq!(
            "invalid telemetry item: telemetry baseType required",
            err.to_string()
        );
        assert!(!err.is_fatal_config());
    }
}
