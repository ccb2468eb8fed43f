use crate::models::{truncate_chars, Measurements, Properties, Sanitize};
use serde::Serialize;

/// An instance of PageView represents a generic action on a page like a button click.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewData {
    /// Schema version
    pub ver: i32,

    /// Page name.
    pub name: String,

    /// Request URL with all query string parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Request duration in format: DD.HH:MM:SS.MMMMMM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// Identifier of a page view instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Collection of custom properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,

    /// Collection of custom measurements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Measurements>,
}

impl Sanitize for PageViewData {
    fn sanitize(&mut self) {
        truncate_chars(&mut self.name, 1024);
        if let Some(url) = self.url.as_mut() {
            truncate_chars(url, 2048);
        }
        self.properties.sanitize();
    }
}
