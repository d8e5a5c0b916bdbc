//! Public pages: home, health, legacy landing and committee pages.

use super::{chat_service, post_service, video_service};
use crate::error::ApiResult;
use crate::session::{BaseContext, Viewer};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use victoweb_core::model::post::{Post, Video};
use victoweb_core::service::chat_service::{AdminHub, TaskFilter, LANDING_CHAT_SYSTEM_MESSAGE};
use victoweb_core::service::post_service::CommitteePosts;

#[derive(Serialize)]
pub(crate) struct HomePage {
    #[serde(flatten)]
    context: BaseContext,
    posts: Vec<Post>,
    videos: Vec<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_hub: Option<AdminHub>,
}

pub(crate) async fn home(
    State(state): State<AppState>,
    viewer: Viewer,
) -> ApiResult<Json<HomePage>> {
    let staff_viewer = viewer
        .account
        .as_ref()
        .filter(|account| account.is_admin())
        .map(|account| account.id);
    let clock = state.clock();
    let (posts, videos, admin_hub) = state
        .db
        .call(move |conn| {
            let posts = post_service(conn).list_posts()?;
            let videos = video_service(conn).list_videos()?;
            let admin_hub = match staff_viewer {
                Some(viewer_id) => Some(chat_service(conn).admin_hub(
                    Some(viewer_id),
                    &TaskFilter::default(),
                    LANDING_CHAT_SYSTEM_MESSAGE,
                    clock,
                )?),
                None => None,
            };
            Ok((posts, videos, admin_hub))
        })
        .await?;
    Ok(Json(HomePage {
        context: viewer.base_context(),
        posts,
        videos,
        admin_hub,
    }))
}

pub(crate) async fn health() -> &'static str {
    victoweb_core::ping()
}

pub(crate) async fn legacy(viewer: Viewer) -> Json<BaseContext> {
    Json(viewer.base_context())
}

#[derive(Serialize)]
pub(crate) struct CommitteePage {
    #[serde(flatten)]
    context: BaseContext,
    #[serde(flatten)]
    committee: CommitteePosts,
}

pub(crate) async fn committee(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(key): Path<String>,
) -> ApiResult<Json<CommitteePage>> {
    let committee = state
        .db
        .call(move |conn| Ok(post_service(conn).committee_posts(&key)?))
        .await?;
    Ok(Json(CommitteePage {
        context: viewer.base_context(),
        committee,
    }))
}
