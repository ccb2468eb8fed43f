use crate::models::{
    EventData, ExceptionData, MessageData, MetricData, PageViewData, Properties,
    RemoteDependencyData, Sanitize,
};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::Value;

/// Data struct to contain both B and C sections.
///
/// Serialized as `{ "baseType": ..., "baseData": ... }`.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Data {
    /// `EventData`
    Event(EventData),
    /// `ExceptionData`
    Exception(ExceptionData),
    /// `MessageData`
    Message(MessageData),
    /// `MetricData`
    Metric(MetricData),
    /// `PageviewData`
    PageView(PageViewData),
    /// `RemoteDependencyData`
    RemoteDependency(RemoteDependencyData),
    /// Any other base type with free-form data.
    Custom {
        /// Base type name.
        base_type: String,
        /// Base data.
        base_data: Value,
    },
}

impl Data {
    /// The base type name, e.g. `EventData`.
    pub fn base_type(&self) -> &str {
        match self {
            Data::Event(_) => "EventData",
            Data::Exception(_) => "ExceptionData",
            Data::Message(_) => "MessageData",
            Data::Metric(_) => "MetricData",
            Data::PageView(_) => "PageviewData",
            Data::RemoteDependency(_) => "RemoteDependencyData",
            Data::Custom { base_type, .. } => base_type,
        }
    }

    /// Custom properties, if the base type has any.
    pub fn properties(&self) -> Option<&Properties> {
        match self {
            Data::Event(data) => data.properties.as_ref(),
            Data::Exception(data) => data.properties.as_ref(),
            Data::Message(data) => data.properties.as_ref(),
            Data::Metric(data) => data.properties.as_ref(),
            Data::PageView(data) => data.properties.as_ref(),
            Data::RemoteDependency(data) => data.properties.as_ref(),
            Data::Custom { .. } => None,
        }
    }
}

impl Serialize for Data {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Data", 2)?;
        state.serialize_field("baseType", self.base_type())?;
        match self {
            Data::Event(data) => state.serialize_field("baseData", data)?,
            Data::Exception(data) => state.serialize_field("baseData", data)?,
            Data::Message(data) => state.serialize_field("baseData", data)?,
            Data::Metric(data) => state.serialize_field("baseData", data)?,
            Data::PageView(data) => state.serialize_field("baseData", data)?,
            Data::RemoteDependency(data) => state.serialize_field("baseData", data)?,
            Data::Custom { base_data, .. } => state.serialize_field("baseData", base_data)?,
        }
        state.end()
    }
}

impl Sanitize for Data {
    fn sanitize(&mut self) {
        match self {
            Data::Event(data) => data.sanitize(),
            Data::Exception(data) => data.sanitize(),
            Data::Message(data) => data.sanitize(),
            Data::Metric(data) => data.sanitize(),
            Data::PageView(data) => data.sanitize(),
            Data::RemoteDependency(data) => data.sanitize(),
            Data::Custom { .. } => {}
        }
    }
}
