use crate::{
    context::set_tag,
    models::{context_tag_keys::*, Tags},
};
use serde::Deserialize;

/// The device the application runs on.
///
/// Without host information the device is reported as a generic browser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceContext {
    /// Device id.
    pub id: Option<String>,
    /// Device type, e.g. `Browser` or `PC`.
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    /// Locale, e.g. `en-US`.
    pub locale: Option<String>,
    /// Device model.
    pub model: Option<String>,
    /// OEM name.
    pub oem_name: Option<String>,
    /// Operating system and version.
    pub os_version: Option<String>,
    /// Screen resolution, e.g. `1920X1080`.
    pub resolution: Option<String>,
}

impl Default for DeviceContext {
    fn default() -> Self {
        Self {
            id: Some("browser".into()),
            device_type: Some("Browser".into()),
            locale: None,
            model: None,
            oem_name: None,
            os_version: None,
            resolution: None,
        }
    }
}

impl DeviceContext {
    pub(crate) fn apply(&self, tags: &mut Tags) {
        set_tag(tags, DEVICE_ID, self.id.as_deref());
        set_tag(tags, DEVICE_TYPE, self.device_type.as_deref());
        set_tag(tags, DEVICE_LOCALE, self.locale.as_deref());
        set_tag(tags, DEVICE_MODEL, self.model.as_deref());
        set_tag(tags, DEVICE_OEM_NAME, self.oem_name.as_deref());
        set_tag(tags, DEVICE_OS_VERSION, self.os_version.as_deref());
        set_tag(tags, DEVICE_SCREEN_RESOLUTION, self.resolution.as_deref());
    }
}
