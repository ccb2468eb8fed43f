use serde_repr::Serialize_repr;

/// Severity of a trace or exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize_repr)]
#[repr(u8)]
pub enum SeverityLevel {
    /// Verbose.
    Verbose = 0,
    /// Information.
    Information = 1,
    /// Warning.
    Warning = 2,
    /// Error.
    Error = 3,
    /// Critical.
    Critical = 4,
}

impl From<log::Level> for SeverityLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace | log::Level::Debug => Self::Verbose,
            log::Level::Info => Self::Information,
            log::Level::Warn => Self::Warning,
            log::Level::Error => Self::Error,
        }
    }
}
