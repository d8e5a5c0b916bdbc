//! Login, signup and logout.
//!
//! A successful login or signup mints a session and sets the `sessionid`
//! cookie before redirecting home.

use super::{account_service, redirect_after_form, see_other};
use crate::error::{ApiError, ApiResult};
use crate::session::{clear_session_cookie, session_cookie, BaseContext, Viewer};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use axum::{Form, Json};
use log::info;
use serde::{Deserialize, Serialize};
use victoweb_core::now_millis;
use victoweb_core::service::account_service::SignupRequest;
use victoweb_core::Account;

const AFTER_LOGIN: &str = "/";

#[derive(Serialize)]
pub(crate) struct FormPage {
    #[serde(flatten)]
    context: BaseContext,
    fields: &'static [&'static str],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginForm {
    username: String,
    password: String,
}

pub(crate) async fn login_page(viewer: Viewer) -> Json<FormPage> {
    Json(FormPage {
        context: viewer.base_context(),
        fields: &["username", "password"],
    })
}

pub(crate) async fn signup_page(viewer: Viewer) -> Json<FormPage> {
    Json(FormPage {
        context: viewer.base_context(),
        fields: &["username", "full_name", "phone", "password1", "password2"],
    })
}

pub(crate) async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    let account = state
        .db
        .call(move |conn| Ok(account_service(conn).authenticate(&form.username, &form.password)?))
        .await?;
    start_session_response(&state, &headers, account).await
}

pub(crate) async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<SignupRequest>,
) -> ApiResult<Response> {
    let account = state
        .db
        .call(move |conn| Ok(account_service(conn).signup(&request)?))
        .await?;
    start_session_response(&state, &headers, account).await
}

pub(crate) async fn logout(State(state): State<AppState>, viewer: Viewer) -> ApiResult<Response> {
    let account_id = viewer.require_login()?.id;
    if let Some(session_key) = viewer.session_key.clone() {
        state
            .db
            .call(move |conn| Ok(account_service(conn).end_session(&session_key)?))
            .await?;
    }
    info!("event=account_logout module=http status=ok account_id={}", account_id);
    let mut response = see_other("/login/");
    let headers = response.headers_mut();
    headers.insert("hx-redirect", HeaderValue::from_static("/login.html"));
    headers.append(header::SET_COOKIE, cookie_value(&clear_session_cookie())?);
    Ok(response)
}

async fn start_session_response(
    state: &AppState,
    headers: &HeaderMap,
    account: Account,
) -> ApiResult<Response> {
    let ttl_secs = state.settings.session_ttl_secs;
    let grant = state
        .db
        .call(move |conn| {
            Ok(account_service(conn).start_session(&account, now_millis(), ttl_secs)?)
        })
        .await?;
    let mut response = redirect_after_form(headers, AFTER_LOGIN);
    response
        .headers_mut()
        .append(header::SET_COOKIE, cookie_value(&session_cookie(&grant.session_key, ttl_secs))?);
    Ok(response)
}

fn cookie_value(cookie: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(cookie)
        .map_err(|err| ApiError::Internal(format!("invalid cookie header: {err}")))
}
