use crate::{
    convert::time_to_string,
    models::{truncate_chars, Data, Sanitize, Tags},
};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Placeholder in envelope names replaced by the instrumentation key.
pub const NAME_PLACEHOLDER: &str = "{0}";

/// A single telemetry item travelling through the plugin pipeline.
///
/// Before entering the pipeline `name`, `time`, `i_key` and the base type (`data`) must be set.
/// The orchestrator fills `time`, `i_key` and `ver` when missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryItem {
    /// Envelope name, usually `Microsoft.ApplicationInsights.{0}.<Type>`.
    pub name: String,
    /// Event time.
    #[serde(
        serialize_with = "serialize_time",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<DateTime<Utc>>,
    /// Instrumentation key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub i_key: Option<String>,
    /// Envelope schema version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ver: Option<String>,
    /// Sampling percentage that applied to this item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
    /// Context tags.
    #[serde(skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// Extension data for plugins.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub ext: Map<String, Value>,
    /// Base type and base data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

impl TelemetryItem {
    /// Create an item with the given envelope name and data.
    pub fn new(name: impl Into<String>, data: Data) -> Self {
        Self {
            name: name.into(),
            data: Some(data),
            ..Default::default()
        }
    }

    /// The base type, e.g. `EventData`.
    pub fn base_type(&self) -> Option<&str> {
        self.data
            .as_ref()
            .map(Data::base_type)
            .filter(|base_type| !base_type.is_empty())
    }

    /// Whether this item carries a metric.
    pub fn is_metric(&self) -> bool {
        matches!(self.data, Some(Data::Metric(_)))
    }
}

impl Sanitize for TelemetryItem {
    fn sanitize(&mut self) {
        truncate_chars(&mut self.name, 1024);
        self.tags.sanitize();
        self.data.sanitize();
    }
}

fn serialize_time<S>(time: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match time {
        Some(time) => serializer.serialize_str(&time_to_string(time)),
        None => serializer.serialize_none(),
    }
}
