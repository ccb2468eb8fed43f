//! Persistence capability consumed by the session and user contexts.
//!
//! The SDK keeps its identities in two tiers: cookies, which are authoritative, and local
//! storage, which backs up the session when its cookie is gone. Hosts provide both through a
//! [`PersistenceStore`]. Every operation must be infallible from the caller's point of view and
//! report denial with a sentinel (`None` / `false`).

use crate::{diagnostics::InternalMessageId, Config, DiagnosticLogger, Error};
use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

/// Storage tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTier {
    /// Cookies. Authoritative for user and session identity.
    Cookie,
    /// Local storage. Backup of the session.
    Local,
}

/// Key-value persistence for both tiers.
pub trait PersistenceStore: Debug + Send + Sync {
    /// Read `key`. `None` when missing or access is denied.
    fn get(&self, tier: StoreTier, key: &str) -> Option<String>;

    /// Write `key`. For cookies `value` may carry attributes after a `;`, e.g.
    /// `id|1|2;expires=Thu, 01 Jan 1970 00:00:00 GMT`. Returns `false` when access is denied.
    fn set(&self, tier: StoreTier, key: &str, value: &str, domain: Option<&str>) -> bool;

    /// Delete `key`. Returns `false` when access is denied.
    fn remove(&self, tier: StoreTier, key: &str) -> bool;
}

/// In-memory [`PersistenceStore`].
///
/// Behaves like a browser jar: cookie reads return the value without its attributes. Either tier
/// can be made unavailable to simulate a host that denies access.
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(StoreTier, String), String>>,
    raw_cookies: Mutex<HashMap<String, String>>,
    cookie_writes: AtomicUsize,
    local_writes: AtomicUsize,
    cookies_available: AtomicBool,
    local_available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: Mutex::default(),
            raw_cookies: Mutex::default(),
            cookie_writes: AtomicUsize::new(0),
            local_writes: AtomicUsize::new(0),
            cookies_available: AtomicBool::new(true),
            local_available: AtomicBool::new(true),
        }
    }
}

impl MemoryStore {
    /// Create an empty store with both tiers available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow or deny access to `tier`.
    pub fn set_available(&self, tier: StoreTier, available: bool) {
        self.flag(tier).store(available, Ordering::SeqCst);
    }

    /// Successful writes to `tier` so far.
    pub fn writes(&self, tier: StoreTier) -> usize {
        match tier {
            StoreTier::Cookie => self.cookie_writes.load(Ordering::SeqCst),
            StoreTier::Local => self.local_writes.load(Ordering::SeqCst),
        }
    }

    /// The last value written to cookie `name`, attributes included.
    pub fn raw_cookie(&self, name: &str) -> Option<String> {
        lock(&self.raw_cookies).get(name).cloned()
    }

    fn flag(&self, tier: StoreTier) -> &AtomicBool {
        match tier {
            StoreTier::Cookie => &self.cookies_available,
            StoreTier::Local => &self.local_available,
        }
    }

    fn available(&self, tier: StoreTier) -> bool {
        self.flag(tier).load(Ordering::SeqCst)
    }
}

impl PersistenceStore for MemoryStore {
    fn get(&self, tier: StoreTier, key: &str) -> Option<String> {
        if !self.available(tier) {
            return None;
        }
        lock(&self.entries).get(&(tier, key.to_string())).cloned()
    }

    fn set(&self, tier: StoreTier, key: &str, value: &str, _domain: Option<&str>) -> bool {
        if !self.available(tier) {
            return false;
        }
        let stored = match tier {
            StoreTier::Cookie => {
                lock(&self.raw_cookies).insert(key.to_string(), value.to_string());
                self.cookie_writes.fetch_add(1, Ordering::SeqCst);
                value.split(';').next().unwrap_or_default()
            }
            StoreTier::Local => {
                self.local_writes.fetch_add(1, Ordering::SeqCst);
                value
            }
        };
        lock(&self.entries).insert((tier, key.to_string()), stored.to_string());
        true
    }

    fn remove(&self, tier: StoreTier, key: &str) -> bool {
        if !self.available(tier) {
            return false;
        }
        if tier == StoreTier::Cookie {
            lock(&self.raw_cookies).remove(key);
        }
        lock(&self.entries).remove(&(tier, key.to_string()));
        true
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The store as seen by the SDK: honors the disable switches and reports failures.
#[derive(Debug, Clone)]
pub(crate) struct Persistence {
    store: Arc<dyn PersistenceStore>,
    logger: Arc<DiagnosticLogger>,
    cookies_enabled: bool,
    storage_enabled: bool,
    cookie_domain: Option<String>,
}

impl Persistence {
    pub(crate) fn new(
        store: Arc<dyn PersistenceStore>,
        logger: Arc<DiagnosticLogger>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            logger,
            cookies_enabled: !config.is_cookie_use_disabled,
            storage_enabled: !config.is_storage_use_disabled,
            cookie_domain: config.cookie_domain.clone(),
        }
    }

    pub(crate) fn logger(&self) -> &DiagnosticLogger {
        &self.logger
    }

    pub(crate) fn get_cookie(&self, name: &str) -> Option<String> {
        if !self.cookies_enabled {
            return None;
        }
        self.store
            .get(StoreTier::Cookie, name)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn set_cookie(&self, name: &str, value: &str) -> Result<bool, Error> {
        if !self.cookies_enabled {
            return Ok(false);
        }
        let written =
            self.store
                .set(StoreTier::Cookie, name, value, self.cookie_domain.as_deref());
        if !written {
            self.logger.warn_internal(
                InternalMessageId::BrowserCannotWriteCookie,
                &format!("Could not write cookie {}", name),
            )?;
        }
        Ok(written)
    }

    pub(crate) fn delete_cookie(&self, name: &str) -> bool {
        self.cookies_enabled && self.store.remove(StoreTier::Cookie, name)
    }

    pub(crate) fn can_use_local_storage(&self) -> bool {
        self.storage_enabled
    }

    pub(crate) fn get_storage(&self, key: &str) -> Option<String> {
        if !self.storage_enabled {
            return None;
        }
        self.store
            .get(StoreTier::Local, key)
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn set_storage(&self, key: &str, value: &str) -> Result<bool, Error> {
        if !self.storage_enabled {
            return Ok(false);
        }
        let written = self.store.set(StoreTier::Local, key, value, None);
        if !written {
            self.logger.warn_internal(
                InternalMessageId::BrowserCannotWriteLocalStorage,
                &format!("Could not write local storage key {}", key),
            )?;
        }
        Ok(written)
    }

    pub(crate) fn remove_storage(&self, key: &str) -> bool {
        self.storage_enabled && self.store.remove(StoreTier::Local, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_attributes_are_not_returned() {
        let store = MemoryStore::new();
        assert!(store.set(
            StoreTier::Cookie,
            "ai_session",
            "a|1|2;expires=Thu, 01 Jan 1970 00:00:00 GMT",
            None
        ));
        assert_eq!(
            Some("a|1|2".to_string()),
            store.get(StoreTier::Cookie, "ai_session")
        );
        assert_eq!(
            Some("a|1|2;expires=Thu, 01 Jan 1970 00:00:00 GMT".to_string()),
            store.raw_cookie("ai_session")
        );
        assert_eq!(None, store.get(StoreTier::Local, "ai_session"));
        assert_eq!(1, store.writes(StoreTier::Cookie));
        assert_eq!(0, store.writes(StoreTier::Local));
    }

    #[test]
    fn unavailable_tier_returns_sentinels() {
        let store = MemoryStore::new();
        store.set(StoreTier::Local, "k", "v", None);
        store.set_available(StoreTier::Local, false);
        assert_eq!(None, store.get(StoreTier::Local, "k"));
        assert!(!store.set(StoreTier::Local, "k", "w", None));
        assert!(!store.remove(StoreTier::Local, "k"));
        store.set_available(StoreTier::Local, true);
        assert_eq!(Some("v".to_string()), store.get(StoreTier::Local, "k"));
    }

    #[test]
    fn disabled_cookies_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let mut config = Config::new("key");
        config.is_cookie_use_disabled = true;
        let logger = Arc::new(DiagnosticLogger::new(&config));
        let persistence = Persistence::new(store.clone(), logger, &config);
        assert!(!persistence.set_cookie("ai_user", "x").unwrap());
        assert_eq!(0, store.writes(StoreTier::Cookie));
        assert!(persistence.set_storage("ai_session", "x").unwrap());
        assert_eq!(Some("x".to_string()), persistence.get_storage("ai_session"));
    }
}
