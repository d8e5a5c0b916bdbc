//! Cookie sessions and the per-request viewer.

use crate::error::{ApiError, ApiResult};
use crate::routes::account_service;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use serde::Serialize;
use victoweb_core::model::committee::{iter_committees, Committee};
use victoweb_core::now_millis;
use victoweb_core::{Account, AccountId};

pub const SESSION_COOKIE: &str = "sessionid";

/// Session key from the `Cookie` header(s), if any.
pub fn session_key_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn session_cookie(session_key: &str, max_age_secs: u64) -> String {
    format!(
        "{SESSION_COOKIE}={session_key}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}"
    )
}

pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0")
}

pub fn is_htmx(headers: &HeaderMap) -> bool {
    headers
        .get("hx-request")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

/// Fields every page response carries.
#[derive(Debug, Clone, Serialize)]
pub struct BaseContext {
    pub is_auth: bool,
    pub is_admin: bool,
    pub can_publish_tasks: bool,
    pub can_publish_media: bool,
    pub current_user_id: Option<AccountId>,
    pub current_user_name: String,
    pub committees: Vec<&'static Committee>,
}

/// Whoever sent the request, resolved from the session cookie.
#[derive(Debug, Clone, Default)]
pub struct Viewer {
    pub account: Option<Account>,
    pub session_key: Option<String>,
}

impl Viewer {
    pub fn account_id(&self) -> Option<AccountId> {
        self.account.as_ref().map(|account| account.id)
    }

    pub fn require_login(&self) -> ApiResult<&Account> {
        self.account.as_ref().ok_or(ApiError::Unauthorized)
    }

    pub fn require_admin(&self) -> ApiResult<&Account> {
        let account = self.require_login()?;
        if account.is_admin() {
            Ok(account)
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn require_task_publisher(&self) -> ApiResult<&Account> {
        let account = self.require_login()?;
        if account.can_publish_tasks() {
            Ok(account)
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn require_media_publisher(&self) -> ApiResult<&Account> {
        let account = self.require_login()?;
        if account.can_publish_media() {
            Ok(account)
        } else {
            Err(ApiError::Forbidden)
        }
    }

    pub fn base_context(&self) -> BaseContext {
        let account = self.account.as_ref();
        BaseContext {
            is_auth: account.is_some(),
            is_admin: account.is_some_and(Account::is_admin),
            can_publish_tasks: account.is_some_and(Account::can_publish_tasks),
            can_publish_media: account.is_some_and(Account::can_publish_media),
            current_user_id: account.map(|account| account.id),
            current_user_name: account
                .map(|account| account.username.clone())
                .unwrap_or_default(),
            committees: iter_committees().collect(),
        }
    }
}

impl FromRequestParts<AppState> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(session_key) = session_key_from_headers(&parts.headers) else {
            return Ok(Self::default());
        };
        let now = now_millis();
        let lookup_key = session_key.clone();
        let account = state
            .db
            .call(move |conn| Ok(account_service(conn).resolve_session(&lookup_key, now)?))
            .await?;
        Ok(Self {
            account,
            session_key: Some(session_key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reads_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sessionid=abc123 ; lang=en"),
        );
        assert_eq!(session_key_from_headers(&headers).as_deref(), Some("abc123"));

        headers.insert(header::COOKIE, HeaderValue::from_static("sessionid="));
        assert_eq!(session_key_from_headers(&headers), None);
    }

    #[test]
    fn cookie_attributes() {
        assert_eq!(
            session_cookie("k", 60),
            "sessionid=k; HttpOnly; SameSite=Lax; Path=/; Max-Age=60"
        );
        assert!(clear_session_cookie().ends_with("Max-Age=0"));
    }

    #[test]
    fn anonymous_viewer_is_rejected_with_401() {
        let viewer = Viewer::default();
        assert!(matches!(viewer.require_login(), Err(ApiError::Unauthorized)));
        assert!(matches!(viewer.require_admin(), Err(ApiError::Unauthorized)));
        let context = viewer.base_context();
        assert!(!context.is_auth);
        assert_eq!(context.committees.len(), 5);
    }
}
