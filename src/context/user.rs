use crate::{
    clock::Clock,
    context::set_tag,
    convert::{ms_to_http_date, ms_to_time, new_id, time_to_string},
    diagnostics::{InternalMessageId, LoggingSeverity},
    models::{context_tag_keys::*, Tags},
    session::{SESSION_COOKIE_NAME, USER_COOKIE_NAME},
    storage::Persistence,
    Config, Error,
};
use std::sync::Arc;

pub(crate) const AUTH_USER_COOKIE_NAME: &str = "ai_authUser";
const USER_COOKIE_LIFETIME_MS: i64 = 365 * 24 * 60 * 60 * 1000;
const COOKIE_SEPARATOR: char = '|';
const FORBIDDEN_ID_CHARS: [char; 5] = [',', ';', '=', '|', ' '];

/// The end user.
///
/// The anonymous id lives in the `ai_user` cookie as `id|acquisitionDate`. The authenticated id
/// and account id are optionally kept in the `ai_authUser` cookie as `authId|accountId`.
#[derive(Debug)]
pub struct UserContext {
    /// Anonymous user id.
    pub id: String,
    /// When the anonymous id was created.
    pub acquisition_date: Option<String>,
    /// Authenticated user id set by the application.
    pub auth_user_id: Option<String>,
    /// Account id of the user.
    pub account_id: Option<String>,
    /// Whether the anonymous id was created by this instance.
    pub is_new_user: bool,
    persistence: Persistence,
    auth_cookie_name: String,
}

impl UserContext {
    pub(crate) fn new(
        config: &Config,
        persistence: Persistence,
        clock: &Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let user_cookie_name = config.cookie_name(USER_COOKIE_NAME);
        let auth_cookie_name = config.cookie_name(AUTH_USER_COOKIE_NAME);

        let mut user = Self {
            id: String::new(),
            acquisition_date: None,
            auth_user_id: None,
            account_id: config.account_id.clone(),
            is_new_user: false,
            persistence,
            auth_cookie_name,
        };

        if let Some(cookie) = user.persistence.get_cookie(&user_cookie_name) {
            let mut params = cookie.split(COOKIE_SEPARATOR);
            if let Some(id) = params.next().filter(|id| !id.is_empty()) {
                user.id = id.to_string();
                user.acquisition_date = params.next().map(str::to_string);
            }
        }

        if user.id.is_empty() {
            let now = clock.now_ms();
            let acquisition_date = time_to_string(&ms_to_time(now));
            user.id = new_id();
            user.is_new_user = true;
            let value = format!(
                "{}{}{};expires={}",
                user.id,
                COOKIE_SEPARATOR,
                acquisition_date,
                ms_to_http_date(now + USER_COOKIE_LIFETIME_MS)
            );
            user.persistence.set_cookie(&user_cookie_name, &value)?;
            user.acquisition_date = Some(acquisition_date);

            // A new user can not have a session to resume.
            user.persistence
                .remove_storage(&config.cookie_name(SESSION_COOKIE_NAME));
        }

        if let Some(cookie) = user.persistence.get_cookie(&user.auth_cookie_name) {
            let mut params = cookie.split(COOKIE_SEPARATOR);
            user.auth_user_id = params
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            if let Some(account_id) = params.next().filter(|id| !id.is_empty()) {
                user.account_id = Some(account_id.to_string());
            }
        }

        Ok(user)
    }

    /// Set the authenticated user id and optionally the account id.
    ///
    /// Ids containing any of `,;=| ` are rejected with a user actionable warning. With
    /// `store_in_cookie` the ids survive across instances in the `ai_authUser` cookie.
    pub fn set_authenticated_user_context(
        &mut self,
        authenticated_user_id: &str,
        account_id: Option<&str>,
        store_in_cookie: bool,
    ) -> Result<(), Error> {
        let is_invalid = |id: &str| id.contains(&FORBIDDEN_ID_CHARS[..]);
        if is_invalid(authenticated_user_id) || account_id.is_some_and(is_invalid) {
            return self.persistence.logger().throw_internal(
                LoggingSeverity::Warning,
                InternalMessageId::SetAuthContextFailedAccountName,
                "Setting auth user context failed. User auth/account id should be of type string, and not contain commas, semi-colons, equal signs, spaces, or vertical-bars.",
                None,
                true,
            );
        }

        self.auth_user_id = Some(authenticated_user_id.to_string());
        let mut cookie = authenticated_user_id.to_string();
        if let Some(account_id) = account_id {
            self.account_id = Some(account_id.to_string());
            cookie.push(COOKIE_SEPARATOR);
            cookie.push_str(account_id);
        }

        if store_in_cookie {
            self.persistence.set_cookie(&self.auth_cookie_name, &cookie)?;
        }
        Ok(())
    }

    /// Forget the authenticated user and account id and delete the `ai_authUser` cookie.
    pub fn clear_authenticated_user_context(&mut self) {
        self.auth_user_id = None;
        self.account_id = None;
        self.persistence.delete_cookie(&self.auth_cookie_name);
    }

    pub(crate) fn apply(&self, tags: &mut Tags) {
        set_tag(tags, USER_ID, Some(&self.id));
        set_tag(tags, USER_AUTH_USER_ID, self.auth_user_id.as_deref());
        set_tag(tags, USER_ACCOUNT_ID, self.account_id.as_deref());
    }
}
