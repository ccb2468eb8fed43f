//! Context providers and the telemetry context composing them.

mod application;
mod device;
mod internal;
mod location;
mod operation;
mod user;

pub use application::ApplicationContext;
pub use device::DeviceContext;
pub use internal::InternalContext;
pub use location::LocationContext;
pub use operation::OperationContext;
pub use user::UserContext;

use crate::{
    clock::Clock,
    models::{context_tag_keys::*, ContextTagKey, TelemetryItem, Tags},
    sampling::Sample,
    session::{Session, SessionManager},
    storage::Persistence,
    Config, Error,
};
use std::sync::Arc;

/// Write `value` to `key` unless the value is missing or the tag is already set.
pub(crate) fn set_tag(tags: &mut Tags, key: ContextTagKey, value: Option<&str>) {
    if let Some(value) = value {
        tags.insert_if_absent(key, value);
    }
}

/// Everything known about the environment telemetry is sent from.
#[derive(Debug)]
pub struct TelemetryContext {
    /// Application context.
    pub application: ApplicationContext,
    /// Device context.
    pub device: DeviceContext,
    /// SDK context.
    pub internal: InternalContext,
    /// Location context.
    pub location: LocationContext,
    /// Current operation.
    pub operation: OperationContext,
    /// End user.
    pub user: UserContext,
    /// A session set by the application. When its id is set it replaces the automatic session.
    pub session: Session,
    /// Manages the automatic session.
    pub session_manager: SessionManager,
    /// Sampling decision.
    pub sample: Sample,
    instrumentation_key: String,
}

impl TelemetryContext {
    pub(crate) fn new(
        config: &Config,
        persistence: Persistence,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let sample = Sample::new(config.sampling_percentage, persistence.logger())?;
        let user = UserContext::new(config, persistence.clone(), &clock)?;
        Ok(Self {
            application: ApplicationContext::new(config),
            device: config.device.clone(),
            internal: InternalContext::new(config),
            location: LocationContext::default(),
            operation: OperationContext::new(),
            user,
            session: Session::default(),
            session_manager: SessionManager::with_persistence(config, persistence, clock),
            sample,
            instrumentation_key: config.instrumentation_key.clone(),
        })
    }

    /// The instrumentation key stamped on every item.
    pub fn instrumentation_key(&self) -> &str {
        &self.instrumentation_key
    }

    /// Refresh the automatic session unless the application set its own, then tag `item` with
    /// the session in effect.
    pub fn apply_session_context(&mut self, item: &mut TelemetryItem) -> Result<(), Error> {
        let session = if self.session.id.is_some() {
            &self.session
        } else {
            self.session_manager.update()?;
            self.session_manager.automatic_session()
        };
        set_tag(&mut item.tags, SESSION_ID, session.id.as_deref());
        if session.is_first {
            set_tag(&mut item.tags, SESSION_IS_FIRST, Some("true"));
        }
        Ok(())
    }

    /// Tag `item` with the application, device, internal, location, operation and user
    /// contexts. Tags already on the item are kept.
    pub fn apply_context_tags(&self, item: &mut TelemetryItem) {
        self.application.apply(&mut item.tags);
        self.device.apply(&mut item.tags);
        self.internal.apply(&mut item.tags);
        self.location.apply(&mut item.tags);
        self.operation.apply(&mut item.tags);
        self.user.apply(&mut item.tags);
    }

    /// Record the sampling percentage on `item`.
    pub fn apply_sample(&self, item: &mut TelemetryItem) {
        item.sample_rate = Some(self.sample.sample_rate());
    }

    /// Stamp the instrumentation key on `item`.
    pub fn apply_instrumentation_key(&self, item: &mut TelemetryItem) {
        item.i_key = Some(self.instrumentation_key.clone());
    }

    /// All of the above, in order.
    pub fn apply(&mut self, item: &mut TelemetryItem) -> Result<(), Error> {
        self.apply_session_context(item)?;
        self.apply_context_tags(item);
        self.apply_sample(item);
        self.apply_instrumentation_key(item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        storage::{MemoryStore, PersistenceStore, StoreTier},
        DiagnosticLogger,
    };

    fn context(config: &Config, store: Arc<MemoryStore>) -> TelemetryContext {
        let logger = Arc::new(DiagnosticLogger::new(config));
        TelemetryContext::new(
            config,
            Persistence::new(store, logger, config),
            Arc::new(ManualClock::new(1_000)),
        )
        .unwrap()
    }

    #[test]
    fn stamps_all_contexts() {
        let config = Config::new("key")
            .with_application_version("1.2.3")
            .with_sampling_percentage(50.0);
        let mut context = context(&config, Arc::new(MemoryStore::new()));
        context.location.ip = Some("10.0.0.1".into());
        let mut item = TelemetryItem::default();
        context.apply(&mut item).unwrap();

        let session_id = context.session_manager.automatic_session().id.clone();
        assert_eq!(session_id.as_deref(), item.tags.get(SESSION_ID));
        assert_eq!(Some("true"), item.tags.get(SESSION_IS_FIRST));
        assert_eq!(Some("1.2.3"), item.tags.get(APPLICATION_VERSION));
        assert_eq!(Some("browser"), item.tags.get(DEVICE_ID));
        assert_eq!(Some("Browser"), item.tags.get(DEVICE_TYPE));
        assert_eq!(Some("10.0.0.1"), item.tags.get(LOCATION_IP));
        assert_eq!(Some(context.operation.id.as_str()), item.tags.get(OPERATION_ID));
        assert_eq!(Some(context.user.id.as_str()), item.tags.get(USER_ID));
        assert!(item
            .tags
            .get(INTERNAL_SDK_VERSION)
            .unwrap()
            .starts_with("rust:"));
        assert_eq!(None, item.tags.get(USER_AUTH_USER_ID));
        assert_eq!(Some(50.0), item.sample_rate);
        assert_eq!(Some("key"), item.i_key.as_deref());
    }

    #[test]
    fn item_tags_win() {
        let config = Config::new("key");
        let mut context = context(&config, Arc::new(MemoryStore::new()));
        let mut item = TelemetryItem::default();
        item.tags.insert(USER_ID, "explicit");
        item.tags.insert(SESSION_ID, "explicit-session");
        context.apply(&mut item).unwrap();
        assert_eq!(Some("explicit"), item.tags.get(USER_ID));
        assert_eq!(Some("explicit-session"), item.tags.get(SESSION_ID));
    }

    #[test]
    fn custom_session_skips_manager() {
        let config = Config::new("key");
        let store = Arc::new(MemoryStore::new());
        let mut context = context(&config, store.clone());
        context.session.id = Some("custom".into());
        let mut item = TelemetryItem::default();
        context.apply(&mut item).unwrap();

        assert_eq!(Some("custom"), item.tags.get(SESSION_ID));
        assert_eq!(None, item.tags.get(SESSION_IS_FIRST));
        assert_eq!(None, context.session_manager.automatic_session().id);
        assert_eq!(None, store.get(StoreTier::Cookie, "ai_session"));
    }

    #[test]
    fn resumed_session_is_not_first() {
        let config = Config::new("key");
        let store = Arc::new(MemoryStore::new());
        store.set(StoreTier::Cookie, "ai_user", "u|x", None);
        store.set(StoreTier::Cookie, "ai_session", "s|900|900", None);
        let mut context = context(&config, store);
        let mut item = TelemetryItem::default();
        context.apply(&mut item).unwrap();
        assert_eq!(Some("s"), item.tags.get(SESSION_ID));
        assert!(!item.tags.contains(SESSION_IS_FIRST));
        assert_eq!(Some("u"), item.tags.get(USER_ID));
    }
}
