use crate::{
    connection_string::{ConnectionString, DEFAULT_BREEZE_ENDPOINT},
    context::DeviceContext,
    Error,
};
use serde::Deserialize;

pub(crate) const CONNECTION_STRING_ENV: &str = "APPLICATIONINSIGHTS_CONNECTION_STRING";

/// Default renewal span: a session ends after 30 minutes of inactivity.
pub const DEFAULT_SESSION_RENEWAL_MS: i64 = 30 * 60 * 1000;
/// Default acquisition span: a session ends 24 hours after it started.
pub const DEFAULT_SESSION_EXPIRATION_MS: i64 = 24 * 60 * 60 * 1000;

/// SDK configuration.
///
/// All fields have defaults, so a configuration can be deserialized from a partial JSON document:
///
/// ```
/// let config = application_insights_sdk::Config::from_json(
///     r#"{ "instrumentationKey": "0fdcec70-0ce5-4085-89d9-9ae8ead9af66", "samplingPercentage": 50 }"#,
/// )
/// .unwrap();
/// assert_eq!(50.0, config.sampling_percentage);
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Instrumentation key of the Application Insights resource.
    pub instrumentation_key: String,
    /// Connection string. Overrides `instrumentation_key` and `endpoint_url` when set.
    pub connection_string: Option<String>,
    /// Track endpoint for channels.
    pub endpoint_url: String,
    /// A session is renewed when it was inactive for longer than this.
    pub session_renewal_ms: i64,
    /// A session is renewed when it is older than this.
    pub session_expiration_ms: i64,
    /// Domain passed to cookie writes.
    pub cookie_domain: Option<String>,
    /// Prefix of all cookie and storage names.
    pub name_prefix: String,
    /// Never read or write cookies.
    pub is_cookie_use_disabled: bool,
    /// Never read or write local storage.
    pub is_storage_use_disabled: bool,
    /// Percentage of telemetry to keep, `0..=100`.
    pub sampling_percentage: f64,
    /// Return internal diagnostics as errors instead of logging them.
    pub enable_debug_exceptions: bool,
    /// Echo and queue every internal diagnostic.
    pub verbose_logging: bool,
    /// Console threshold: 0 = off, 1 = critical, 2 = critical and warnings.
    pub logging_level_console: u8,
    /// Internal telemetry threshold: 0 = off, 1 = critical, 2 = critical and warnings.
    pub logging_level_telemetry: u8,
    /// Queued internal messages per throttle cycle.
    pub max_internal_message_limit: usize,
    /// Period of the internal log poller.
    pub diagnostic_log_interval_ms: u64,
    /// Application version.
    pub application_version: Option<String>,
    /// Application build.
    pub application_build: Option<String>,
    /// Account id of the user.
    pub account_id: Option<String>,
    /// Prefix of the reported SDK version.
    pub sdk_extension: Option<String>,
    /// Device description.
    pub device: DeviceContext,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            instrumentation_key: String::new(),
            connection_string: None,
            endpoint_url: format!("{}/v2/track", DEFAULT_BREEZE_ENDPOINT),
            session_renewal_ms: DEFAULT_SESSION_RENEWAL_MS,
            session_expiration_ms: DEFAULT_SESSION_EXPIRATION_MS,
            cookie_domain: None,
            name_prefix: String::new(),
            is_cookie_use_disabled: false,
            is_storage_use_disabled: false,
            sampling_percentage: 100.0,
            enable_debug_exceptions: false,
            verbose_logging: false,
            logging_level_console: 0,
            logging_level_telemetry: 1,
            max_internal_message_limit: 25,
            diagnostic_log_interval_ms: 10_000,
            application_version: None,
            application_build: None,
            account_id: None,
            sdk_extension: None,
            device: DeviceContext::default(),
        }
    }
}

impl Config {
    /// Create a configuration for the given instrumentation key.
    pub fn new(instrumentation_key: impl Into<String>) -> Self {
        Self {
            instrumentation_key: instrumentation_key.into(),
            ..Default::default()
        }
    }

    /// Create a configuration from a connection string.
    pub fn from_connection_string(connection_string: impl AsRef<str>) -> Result<Self, Error> {
        Self {
            connection_string: Some(connection_string.as_ref().to_string()),
            ..Default::default()
        }
        .validate()
    }

    /// Create a configuration from the `APPLICATIONINSIGHTS_CONNECTION_STRING` environment
    /// variable.
    pub fn from_env() -> Result<Self, Error> {
        let connection_string = std::env::var(CONNECTION_STRING_ENV)
            .map_err(|_| Error::MissingEnvironmentVariable(CONNECTION_STRING_ENV))?;
        Self::from_connection_string(connection_string)
    }

    /// Deserialize a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(Error::InvalidConfig)
    }

    /// Resolve the connection string and check that an instrumentation key is present.
    pub fn validate(mut self) -> Result<Self, Error> {
        if let Some(connection_string) = self.connection_string.as_deref() {
            let parsed: ConnectionString = connection_string.parse()?;
            self.endpoint_url = parsed.track_endpoint();
            self.instrumentation_key = parsed.instrumentation_key;
        }
        if self.instrumentation_key.trim().is_empty() {
            return Err(Error::MissingInstrumentationKey);
        }
        Ok(self)
    }

    /// Set the sampling percentage.
    pub fn with_sampling_percentage(mut self, sampling_percentage: f64) -> Self {
        self.sampling_percentage = sampling_percentage;
        self
    }

    /// Set both session windows.
    pub fn with_session_spans(mut self, renewal_ms: i64, expiration_ms: i64) -> Self {
        self.session_renewal_ms = renewal_ms;
        self.session_expiration_ms = expiration_ms;
        self
    }

    /// Enable or disable debug exceptions.
    pub fn with_debug_exceptions(mut self, enable: bool) -> Self {
        self.enable_debug_exceptions = enable;
        self
    }

    /// Enable or disable verbose internal logging.
    pub fn with_verbose_logging(mut self, enable: bool) -> Self {
        self.verbose_logging = enable;
        self
    }

    /// Add an application version to all telemetry items.
    ///
    /// ```
    /// let config = application_insights_sdk::Config::new("...")
    ///     .with_application_version(std::env!("CARGO_PKG_VERSION"));
    /// ```
    pub fn with_application_version(mut self, ver: impl Into<String>) -> Self {
        self.application_version = Some(ver.into());
        self
    }

    /// Set the cookie domain.
    pub fn with_cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie_domain = Some(domain.into());
        self
    }

    /// Set the device description.
    pub fn with_device(mut self, device: DeviceContext) -> Self {
        self.device = device;
        self
    }

    pub(crate) fn cookie_name(&self, name: &str) -> String {
        format!("{}{}", self.name_prefix, name)
    }
}
