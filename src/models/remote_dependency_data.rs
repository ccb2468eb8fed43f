use crate::models::{truncate_chars, Measurements, Properties, Sanitize};
use serde::Serialize;

/// An instance of Remote Dependency represents an interaction of the monitored component with a
/// remote component/service like SQL or an HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteDependencyData {
    /// Schema version
    pub ver: i32,
    /// Name of the command initiated with this dependency call.
    pub name: String,
    /// Identifier of a dependency call instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Result code of a dependency call, e.g. the HTTP status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    /// Request duration in format: DD.HH:MM:SS.MMMMMM.
    pub duration: String,
    /// Indication of successful or unsuccessful call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Command initiated by this dependency call, e.g. the full URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    /// Target site of a dependency call, e.g. the host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Dependency type name, e.g. `Ajax` or `Fetch`.
    #[serde(skip_serializing_if = "Option::is_none", rename = "type")]
    pub type_: Option<String>,
    /// Collection of custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
    /// Collection of custom measurements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Measurements>,
}

impl Default for RemoteDependencyData {
    fn default() -> Self {
        Self {
            ver: 2,
            name: String::default(),
            id: Option::default(),
            result_code: Option::default(),
            duration: String::default(),
            success: Some(true),
            data: Option::default(),
            target: Option::default(),
            type_: Option::default(),
            properties: Option::default(),
            measurements: Option::default(),
        }
    }
}

impl Sanitize for RemoteDependencyData {
    fn sanitize(&mut self) {
        truncate_chars(&mut self.name, 1024);
        if let Some(id) = self.id.as_mut() {
            truncate_chars(id, 128);
        }
        if let Some(result_code) = self.result_code.as_mut() {
            truncate_chars(result_code, 1024);
        }
        if let Some(data) = self.data.as_mut() {
            truncate_chars(data, 8192);
        }
        if let Some(target) = self.target.as_mut() {
            truncate_chars(target, 1024);
        }
        self.properties.sanitize();
    }
}
