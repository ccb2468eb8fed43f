//! Session identity.
//!
//! A session groups the telemetry of one continuous visit. It is renewed when it was inactive for
//! longer than the renewal span or when it is older than the acquisition span. The current
//! session lives in the `ai_session` cookie as `id|acquisitionDate|renewalDate` (epoch
//! milliseconds) and can be backed up to local storage in the same format.

use crate::{
    clock::Clock,
    convert::{ms_to_http_date, new_id},
    diagnostics::InternalMessageId,
    storage::{Persistence, PersistenceStore},
    Config, DiagnosticLogger, Error,
};
use serde_json::json;
use std::sync::Arc;

/// The session cookie is rewritten at most once per this many milliseconds.
pub const COOKIE_UPDATE_INTERVAL_MS: i64 = 60_000;

pub(crate) const SESSION_COOKIE_NAME: &str = "ai_session";
pub(crate) const USER_COOKIE_NAME: &str = "ai_user";
const COOKIE_SEPARATOR: char = '|';

/// A session identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Opaque unique id. `None` until the session was acquired.
    pub id: Option<String>,
    /// Whether this is the first session of the user.
    pub is_first: bool,
    /// When the session was acquired, epoch milliseconds.
    pub acquisition_date: i64,
    /// When the session was last renewed, epoch milliseconds.
    pub renewal_date: i64,
}

impl Session {
    fn serialize(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}",
            self.id.as_deref().unwrap_or_default(),
            self.acquisition_date,
            self.renewal_date,
            sep = COOKIE_SEPARATOR
        )
    }
}

/// Where the session manager's current session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// `update` was never called.
    NoSession,
    /// A brand new session for a user without prior sessions (or whose environment was lost).
    FirstSession,
    /// A session recovered from the cookie or the local storage backup.
    ResumedSession,
    /// A new session replacing an expired one.
    RenewedSession,
}

/// Acquires, renews and persists the automatic session.
#[derive(Debug)]
pub struct SessionManager {
    persistence: Persistence,
    clock: Arc<dyn Clock>,
    acquisition_span: i64,
    renewal_span: i64,
    session_cookie_name: String,
    user_cookie_name: String,
    automatic_session: Session,
    state: SessionState,
    cookie_updated_at: Option<i64>,
}

impl SessionManager {
    /// Create a session manager. Nothing is read until the first [`update`](Self::update).
    pub fn new(
        config: &Config,
        store: Arc<dyn PersistenceStore>,
        clock: Arc<dyn Clock>,
        logger: Arc<DiagnosticLogger>,
    ) -> Self {
        Self::with_persistence(config, Persistence::new(store, logger, config), clock)
    }

    pub(crate) fn with_persistence(
        config: &Config,
        persistence: Persistence,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            persistence,
            clock,
            acquisition_span: config.session_expiration_ms,
            renewal_span: config.session_renewal_ms,
            session_cookie_name: config.cookie_name(SESSION_COOKIE_NAME),
            user_cookie_name: config.cookie_name(USER_COOKIE_NAME),
            automatic_session: Session::default(),
            state: SessionState::NoSession,
            cookie_updated_at: None,
        }
    }

    /// The current session.
    pub fn automatic_session(&self) -> &Session {
        &self.automatic_session
    }

    /// Where the current session came from.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Acquire a session if there is none, then renew it if it expired, otherwise refresh its
    /// renewal date (at most once per [`COOKIE_UPDATE_INTERVAL_MS`]).
    ///
    /// Persistence failures never fail this call; they degrade to a first session.
    pub fn update(&mut self) -> Result<(), Error> {
        if self.automatic_session.id.is_none() {
            self.initialize_automatic_session()?;
        }

        let now = self.clock.now_ms();
        let acquisition_expired =
            now - self.automatic_session.acquisition_date > self.acquisition_span;
        let renewal_expired = now - self.automatic_session.renewal_date > self.renewal_span;

        if acquisition_expired || renewal_expired {
            self.automatic_session.is_first = false;
            self.renew()?;
            self.state = SessionState::RenewedSession;
        } else if self
            .cookie_updated_at
            .map_or(true, |updated| now - updated >= COOKIE_UPDATE_INTERVAL_MS)
        {
            self.automatic_session.renewal_date = now;
            self.write_cookie()?;
        }
        Ok(())
    }

    /// Copy the current session to local storage. Returns `false` when local storage is
    /// unavailable.
    pub fn backup(&self) -> Result<bool, Error> {
        if !self.persistence.can_use_local_storage() || self.automatic_session.id.is_none() {
            return Ok(false);
        }
        self.persistence
            .set_storage(&self.session_cookie_name, &self.automatic_session.serialize())
    }

    fn initialize_automatic_session(&mut self) -> Result<(), Error> {
        if let Some(cookie) = self.persistence.get_cookie(&self.session_cookie_name) {
            self.initialize_with_data(&cookie)?;
        } else if let Some(backup) = self.persistence.get_storage(&self.session_cookie_name) {
            // The backup only counts while the user cookie survives. Without it the environment
            // was wiped and the backup is stale.
            if self.persistence.get_cookie(&self.user_cookie_name).is_some() {
                self.initialize_with_data(&backup)?;
            } else {
                self.persistence.remove_storage(&self.session_cookie_name);
            }
        }

        if self.automatic_session.id.is_none() {
            self.automatic_session.is_first = true;
            self.renew()?;
            self.state = SessionState::FirstSession;
        } else {
            self.automatic_session.is_first = false;
            self.state = SessionState::ResumedSession;
        }
        Ok(())
    }

    fn initialize_with_data(&mut self, data: &str) -> Result<(), Error> {
        let mut params = data.split(COOKIE_SEPARATOR);
        self.automatic_session.id = params
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        if self.automatic_session.id.is_none() {
            return Ok(());
        }

        // A date in the future cannot have been written by us.
        let now = self.clock.now_ms();
        let mut parse_failed = false;
        let mut parse_date = |param: Option<&str>| match param.map(str::parse::<i64>) {
            Some(Ok(date)) if date <= now => date.max(0),
            Some(_) => {
                parse_failed = true;
                0
            }
            None => 0,
        };
        self.automatic_session.acquisition_date = parse_date(params.next());
        self.automatic_session.renewal_date = parse_date(params.next());

        let logger = self.persistence.logger();
        if parse_failed {
            logger.critical_internal(
                InternalMessageId::ErrorParsingAISessionCookie,
                "Error parsing ai_session cookie, session will be reset",
                Some(json!({ "cookie": data })),
            )?;
        }
        if self.automatic_session.renewal_date == 0 {
            logger.warn_internal(
                InternalMessageId::SessionRenewalDateIsZero,
                "AI session renewal date is 0, session will be reset.",
            )?;
        }
        Ok(())
    }

    fn renew(&mut self) -> Result<(), Error> {
        let now = self.clock.now_ms();
        self.automatic_session.id = Some(new_id());
        self.automatic_session.acquisition_date = now;
        self.automatic_session.renewal_date = now;
        self.write_cookie()?;

        if !self.persistence.can_use_local_storage() {
            self.persistence.logger().warn_internal(
                InternalMessageId::BrowserDoesNotSupportLocalStorage,
                "Browser does not support local storage. Session durations will be inaccurate.",
            )?;
        }
        Ok(())
    }

    fn write_cookie(&mut self) -> Result<(), Error> {
        let session = &self.automatic_session;
        // The cookie dies with whichever window closes first.
        let acquisition_expiry = session.acquisition_date.saturating_add(self.acquisition_span);
        let renewal_expiry = session.renewal_date.saturating_add(self.renewal_span);
        let expires = if self.acquisition_span == 0 {
            "0".to_string()
        } else {
            ms_to_http_date(acquisition_expiry.min(renewal_expiry))
        };
        let value = format!("{};expires={}", session.serialize(), expires);
        self.persistence
            .set_cookie(&self.session_cookie_name, &value)?;
        self.cookie_updated_at = Some(self.clock.now_ms());
        Ok(())
    }
}
