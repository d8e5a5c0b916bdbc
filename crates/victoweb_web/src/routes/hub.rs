//! Admin hub: chat, task board and the live event stream.
//!
//! # Invariants
//! - Every mutation broadcasts `chat` or `tasks` before responding.
//! - htmx callers get the matching fragment; others are sent back to the hub.

use super::{chat_service, see_other};
use crate::error::ApiResult;
use crate::events::{event_stream_response, HubChange, HEARTBEAT_INTERVAL};
use crate::session::{is_htmx, BaseContext, Viewer};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use victoweb_core::model::chat::{MessageId, TaskId, TodoId};
use victoweb_core::service::chat_service::{
    AdminHub, TaskDraft, TaskFilter, ADMIN_CHAT_SYSTEM_MESSAGE,
};
use victoweb_core::AccountId;

const HUB_PAGE: &str = "/admin/hub";

/// Which part of the hub a response renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum HubView {
    Page,
    Chat,
    Tasks,
}

impl HubView {
    fn system_message(self) -> &'static str {
        match self {
            Self::Page | Self::Chat => ADMIN_CHAT_SYSTEM_MESSAGE,
            Self::Tasks => "",
        }
    }
}

#[derive(Serialize)]
pub(crate) struct HubResponse {
    #[serde(flatten)]
    context: BaseContext,
    view: HubView,
    admin_hub: AdminHub,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MessageForm {
    body: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct StatusForm {
    status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AssignmentForm {
    assigned_to: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct TodoForm {
    label: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ToggleForm {
    is_done: Option<String>,
}

async fn hub_response(
    state: &AppState,
    viewer: &Viewer,
    filter: TaskFilter,
    view: HubView,
) -> ApiResult<Json<HubResponse>> {
    let viewer_id = viewer.account_id();
    let clock = state.clock();
    let admin_hub = state
        .db
        .call(move |conn| {
            let system_message = view.system_message();
            Ok(chat_service(conn).admin_hub(viewer_id, &filter, system_message, clock)?)
        })
        .await?;
    Ok(Json(HubResponse {
        context: viewer.base_context(),
        view,
        admin_hub,
    }))
}

/// Notifies live clients, then answers with a fragment or a redirect.
async fn after_mutation(
    state: &AppState,
    viewer: &Viewer,
    headers: &HeaderMap,
    filter: TaskFilter,
    change: HubChange,
) -> ApiResult<Response> {
    state.hub.broadcast_change(change);
    if !is_htmx(headers) {
        return Ok(see_other(HUB_PAGE));
    }
    let view = match change {
        HubChange::Chat => HubView::Chat,
        HubChange::Tasks => HubView::Tasks,
    };
    Ok(hub_response(state, viewer, filter, view).await?.into_response())
}

pub(crate) async fn hub_page(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<HubResponse>> {
    viewer.require_admin()?;
    hub_response(&state, &viewer, filter, HubView::Page).await
}

pub(crate) async fn chat_fragment(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<HubResponse>> {
    viewer.require_admin()?;
    hub_response(&state, &viewer, filter, HubView::Chat).await
}

pub(crate) async fn tasks_fragment(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<HubResponse>> {
    viewer.require_admin()?;
    hub_response(&state, &viewer, filter, HubView::Tasks).await
}

pub(crate) async fn events(State(state): State<AppState>, viewer: Viewer) -> ApiResult<Response> {
    viewer.require_admin()?;
    Ok(event_stream_response(&state.hub, HEARTBEAT_INTERVAL))
}

pub(crate) async fn create_message(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Query(filter): Query<TaskFilter>,
    Form(form): Form<MessageForm>,
) -> ApiResult<Response> {
    let author_id: AccountId = viewer.require_admin()?.id;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).post_message(author_id, &form.body)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Chat).await
}

pub(crate) async fn delete_message(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<MessageId>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Response> {
    viewer.require_admin()?;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).delete_message(id)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Chat).await
}

pub(crate) async fn create_task(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Query(filter): Query<TaskFilter>,
    Form(draft): Form<TaskDraft>,
) -> ApiResult<Response> {
    let creator = viewer.require_task_publisher()?.id;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).create_task(creator, &draft)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Tasks).await
}

pub(crate) async fn update_task_status(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Query(filter): Query<TaskFilter>,
    Form(form): Form<StatusForm>,
) -> ApiResult<Response> {
    viewer.require_admin()?;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).update_task_status(id, &form.status)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Tasks).await
}

pub(crate) async fn update_task_assignment(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Query(filter): Query<TaskFilter>,
    Form(form): Form<AssignmentForm>,
) -> ApiResult<Response> {
    viewer.require_admin()?;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).update_task_assignment(id, &form.assigned_to)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Tasks).await
}

pub(crate) async fn add_todo(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(task_id): Path<TaskId>,
    Query(filter): Query<TaskFilter>,
    Form(form): Form<TodoForm>,
) -> ApiResult<Response> {
    viewer.require_admin()?;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).add_todo(task_id, &form.label)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Tasks).await
}

pub(crate) async fn delete_task(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<TaskId>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Response> {
    viewer.require_task_publisher()?;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).delete_task(id)?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Tasks).await
}

pub(crate) async fn toggle_todo(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<TodoId>,
    Query(filter): Query<TaskFilter>,
    Form(form): Form<ToggleForm>,
) -> ApiResult<Response> {
    viewer.require_admin()?;
    state
        .db
        .call(move |conn| Ok(chat_service(conn).toggle_todo(id, form.is_done.as_deref())?))
        .await?;
    after_mutation(&state, &viewer, &headers, filter, HubChange::Tasks).await
}
