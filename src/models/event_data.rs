use crate::models::{truncate_chars, Measurements, Properties, Sanitize};
use serde::Serialize;

/// Instances of Event represent structured event records that can be grouped and searched by their
/// properties. Event data item also creates a metric of event count by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventData {
    /// Schema version
    pub ver: i32,

    /// Event name. Keep it low cardinality to allow proper grouping and useful metrics.
    pub name: String,

    /// Collection of custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    /// Collection of custom measurements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Measurements>,
}

impl Sanitize for EventData {
    fn sanitize(&mut self) {
        truncate_chars(&mut self.name, 512);
        self.properties.sanitize();
    }
}
