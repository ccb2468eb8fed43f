//! Well-known Application Insights context tag keys and the tag map of a telemetry item.

use crate::models::{truncate_chars, Sanitize};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{btree_map, BTreeMap, HashMap};

/// A well-known Application Insights context tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextTagKey {
    key: &'static str,
    max_len: usize,
}

impl ContextTagKey {
    const fn new(key: &'static str, max_len: usize) -> Self {
        ContextTagKey { key, max_len }
    }

    /// The tag name, e.g. `ai.session.id`.
    pub fn as_str(&self) -> &'static str {
        self.key
    }

    /// Maximum length of the tag value accepted by the ingestion endpoint.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl AsRef<str> for ContextTagKey {
    fn as_ref(&self) -> &str {
        self.key
    }
}

/// Application version.
pub const APPLICATION_VERSION: ContextTagKey = ContextTagKey::new("ai.application.ver", 1024);

/// Application build.
pub const APPLICATION_BUILD: ContextTagKey = ContextTagKey::new("ai.application.build", 1024);

/// Unique client device id.
pub const DEVICE_ID: ContextTagKey = ContextTagKey::new("ai.device.id", 1024);

/// Device locale using <language>-<REGION> pattern, following RFC 5646. Example 'en-US'.
pub const DEVICE_LOCALE: ContextTagKey = ContextTagKey::new("ai.device.locale", 64);

/// Model of the device the end user of the application is using.
pub const DEVICE_MODEL: ContextTagKey = ContextTagKey::new("ai.device.model", 256);

/// Client device OEM name.
pub const DEVICE_OEM_NAME: ContextTagKey = ContextTagKey::new("ai.device.oemName", 256);

/// Operating system name and version of the device the end user of the application is using.
pub const DEVICE_OS_VERSION: ContextTagKey = ContextTagKey::new("ai.device.osVersion", 256);

/// Screen resolution, e.g. `1920X1080`.
pub const DEVICE_SCREEN_RESOLUTION: ContextTagKey =
    ContextTagKey::new("ai.device.screenResolution", 64);

/// The type of the device the end user of the application is using. Examples: 'PC', 'Phone',
/// 'Browser'.
pub const DEVICE_TYPE: ContextTagKey = ContextTagKey::new("ai.device.type", 64);

/// The IP address of the client device. IPv4 and IPv6 are supported.
pub const LOCATION_IP: ContextTagKey = ContextTagKey::new("ai.location.ip", 46);

/// A unique identifier for the operation instance. Used for finding all the telemetry items for
/// a specific operation instance.
pub const OPERATION_ID: ContextTagKey = ContextTagKey::new("ai.operation.id", 128);

/// The name (group) of the operation, e.g. the page name.
pub const OPERATION_NAME: ContextTagKey = ContextTagKey::new("ai.operation.name", 1024);

/// The unique identifier of the telemetry item's immediate parent.
pub const OPERATION_PARENT_ID: ContextTagKey = ContextTagKey::new("ai.operation.parentId", 128);

/// Name of synthetic source, e.g. a web crawler or an availability test.
pub const OPERATION_SYNTHETIC_SOURCE: ContextTagKey =
    ContextTagKey::new("ai.operation.syntheticSource", 1024);

/// Light weight vector clock used to order related events across clients and services.
pub const OPERATION_CORRELATION_VECTOR: ContextTagKey =
    ContextTagKey::new("ai.operation.correlationVector", 64);

/// Session ID - the instance of the user's interaction with the app.
pub const SESSION_ID: ContextTagKey = ContextTagKey::new("ai.session.id", 64);

/// Whether the session identified by ai.session.id is first for the user or not.
pub const SESSION_IS_FIRST: ContextTagKey = ContextTagKey::new("ai.session.isFirst", 5);

/// In multi-tenant applications this is the account ID or name which the user is acting with.
pub const USER_ACCOUNT_ID: ContextTagKey = ContextTagKey::new("ai.user.accountId", 1024);

/// Anonymous user id. Represents the end user of the application.
pub const USER_ID: ContextTagKey = ContextTagKey::new("ai.user.id", 128);

/// Authenticated user id. Since it's PII information it is not collected by default.
pub const USER_AUTH_USER_ID: ContextTagKey = ContextTagKey::new("ai.user.authUserId", 1024);

/// SDK version.
pub const INTERNAL_SDK_VERSION: ContextTagKey = ContextTagKey::new("ai.internal.sdkVersion", 64);

/// Agent version.
pub const INTERNAL_AGENT_VERSION: ContextTagKey =
    ContextTagKey::new("ai.internal.agentVersion", 64);

const ALL_KEYS: [ContextTagKey; 22] = [
    APPLICATION_VERSION,
    APPLICATION_BUILD,
    DEVICE_ID,
    DEVICE_LOCALE,
    DEVICE_MODEL,
    DEVICE_OEM_NAME,
    DEVICE_OS_VERSION,
    DEVICE_SCREEN_RESOLUTION,
    DEVICE_TYPE,
    LOCATION_IP,
    OPERATION_ID,
    OPERATION_NAME,
    OPERATION_PARENT_ID,
    OPERATION_SYNTHETIC_SOURCE,
    OPERATION_CORRELATION_VECTOR,
    SESSION_ID,
    SESSION_IS_FIRST,
    USER_ACCOUNT_ID,
    USER_ID,
    USER_AUTH_USER_ID,
    INTERNAL_SDK_VERSION,
    INTERNAL_AGENT_VERSION,
];

pub(crate) static TAG_KEY_LOOKUP: Lazy<HashMap<&'static str, ContextTagKey>> = Lazy::new(|| {
    ALL_KEYS.iter().map(|key| (key.as_str(), *key)).collect()
});

/// Context tags of a telemetry item.
///
/// Keys are usually [`ContextTagKey`] constants but any string is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    /// Create an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a tag, returning the previous value.
    pub fn insert(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.as_ref().to_string(), value.into())
    }

    /// Set a tag unless it is already present. Returns whether the tag was written.
    pub fn insert_if_absent(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> bool {
        match self.0.entry(key.as_ref().to_string()) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(value.into());
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Get a tag.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.0.get(key.as_ref()).map(String::as_str)
    }

    /// Whether a tag is present.
    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.0.contains_key(key.as_ref())
    }

    /// Remove a tag.
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<String> {
        self.0.remove(key.as_ref())
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no tags.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all tags in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut tags = Tags::new();
        for (key, value) in iter {
            tags.insert(key, value);
        }
        tags
    }
}

impl Sanitize for Tags {
    fn sanitize(&mut self) {
        for (key, value) in self.0.iter_mut() {
            if let Some(known) = TAG_KEY_LOOKUP.get(key.as_str()) {
                truncate_chars(value, known.max_len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_knows_every_key() {
        assert_eq!(22, TAG_KEY_LOOKUP.len());
        assert_eq!(Some(&SESSION_ID), TAG_KEY_LOOKUP.get("ai.session.id"));
        assert_eq!(None, TAG_KEY_LOOKUP.get("ai.session.unknown"));
    }

    #[test]
    fn insert_if_absent_keeps_existing() {
        let mut tags = Tags::new();
        assert!(tags.insert_if_absent(USER_ID, "item"));
        assert!(!tags.insert_if_absent(USER_ID, "context"));
        assert_eq!(Some("item"), tags.get(USER_ID));
        assert_eq!(Some("item"), tags.get("ai.user.id"));
    }

    #[test]
    fn sanitize_truncates_known_keys_only() {
        let mut tags: Tags = vec![
            (OPERATION_ID.as_str(), "1".repeat(200)),
            ("custom", "2".repeat(200)),
        ]
        .into_iter()
        .collect();
        tags.sanitize();
        assert_eq!(128, tags.get(OPERATION_ID).unwrap().len());
        assert_eq!(200, tags.get("custom").unwrap().len());
    }
}
