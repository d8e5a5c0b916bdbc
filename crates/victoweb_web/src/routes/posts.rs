//! Posts, the media gallery and videos.
//!
//! Reads need a signed-in viewer except post detail and the editor helpers;
//! writes need a media publisher.

use super::{post_service, redirect_after_form, video_service};
use crate::error::ApiResult;
use crate::session::{BaseContext, Viewer};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::{Form, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use victoweb_core::model::post::{Post, PostDraft, PostId, Video, VideoDraft, VideoId};
use victoweb_core::repo::post_repo::MediaListItem;
use victoweb_core::service::post_service::{
    editor_help as editor_help_text, render_post_content, MediaFilter, PostDetail,
};

const POSTS_PAGE: &str = "/posts/";
const VIDEOS_PAGE: &str = "/videos.html";

#[derive(Serialize)]
pub(crate) struct PostsPage {
    #[serde(flatten)]
    context: BaseContext,
    posts: Vec<Post>,
}

#[derive(Serialize)]
pub(crate) struct PostPage {
    #[serde(flatten)]
    context: BaseContext,
    #[serde(flatten)]
    detail: PostDetail,
}

#[derive(Serialize)]
pub(crate) struct MediaPage {
    #[serde(flatten)]
    context: BaseContext,
    media_items: Vec<MediaListItem>,
    current_filter: String,
    current_search: String,
}

#[derive(Serialize)]
pub(crate) struct VideosPage {
    #[serde(flatten)]
    context: BaseContext,
    posts: Vec<Post>,
    videos: Vec<Video>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PreviewForm {
    content: String,
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    viewer: Viewer,
) -> ApiResult<Json<PostsPage>> {
    viewer.require_login()?;
    let posts = state
        .db
        .call(|conn| Ok(post_service(conn).list_posts()?))
        .await?;
    Ok(Json(PostsPage {
        context: viewer.base_context(),
        posts,
    }))
}

pub(crate) async fn post_detail(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(slug): Path<String>,
) -> ApiResult<Json<PostPage>> {
    let detail = state
        .db
        .call(move |conn| Ok(post_service(conn).post_detail(&slug)?))
        .await?;
    Ok(Json(PostPage {
        context: viewer.base_context(),
        detail,
    }))
}

pub(crate) async fn editor_help() -> Json<Value> {
    Json(json!({ "help": editor_help_text() }))
}

pub(crate) async fn preview(Form(form): Form<PreviewForm>) -> Json<Value> {
    Json(json!({ "rendered_content": render_post_content(&form.content) }))
}

pub(crate) async fn media_gallery(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(filter): Query<MediaFilter>,
) -> ApiResult<Json<MediaPage>> {
    viewer.require_login()?;
    let query = filter.clone();
    let media_items = state
        .db
        .call(move |conn| Ok(post_service(conn).list_media(&query)?))
        .await?;
    Ok(Json(MediaPage {
        context: viewer.base_context(),
        media_items,
        current_filter: filter.media_type.trim().to_string(),
        current_search: filter.search.trim().to_string(),
    }))
}

pub(crate) async fn list_videos(
    State(state): State<AppState>,
    viewer: Viewer,
) -> ApiResult<Json<VideosPage>> {
    viewer.require_login()?;
    let (posts, videos) = state
        .db
        .call(|conn| {
            let posts = post_service(conn).list_posts()?;
            let videos = video_service(conn).list_videos()?;
            Ok((posts, videos))
        })
        .await?;
    Ok(Json(VideosPage {
        context: viewer.base_context(),
        posts,
        videos,
    }))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Form(draft): Form<PostDraft>,
) -> ApiResult<Response> {
    viewer.require_media_publisher()?;
    let today = state.clock().today();
    let post = state
        .db
        .call(move |conn| Ok(post_service(conn).create_post(&draft, today)?))
        .await?;
    Ok(redirect_after_form(&headers, &format!("/posts/{}", post.slug)))
}

pub(crate) async fn edit_post(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<PostId>,
    Form(draft): Form<PostDraft>,
) -> ApiResult<Response> {
    viewer.require_media_publisher()?;
    let post = state
        .db
        .call(move |conn| Ok(post_service(conn).update_post(id, &draft)?))
        .await?;
    Ok(redirect_after_form(&headers, &format!("/posts/{}", post.slug)))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> ApiResult<Response> {
    viewer.require_media_publisher()?;
    state
        .db
        .call(move |conn| Ok(post_service(conn).delete_post(id)?))
        .await?;
    Ok(redirect_after_form(&headers, POSTS_PAGE))
}

pub(crate) async fn create_video(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Form(draft): Form<VideoDraft>,
) -> ApiResult<Response> {
    viewer.require_media_publisher()?;
    state
        .db
        .call(move |conn| Ok(video_service(conn).create_video(&draft)?))
        .await?;
    Ok(redirect_after_form(&headers, VIDEOS_PAGE))
}

pub(crate) async fn edit_video(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<VideoId>,
    Form(draft): Form<VideoDraft>,
) -> ApiResult<Response> {
    viewer.require_media_publisher()?;
    state
        .db
        .call(move |conn| Ok(video_service(conn).update_video(id, &draft)?))
        .await?;
    Ok(redirect_after_form(&headers, VIDEOS_PAGE))
}

pub(crate) async fn delete_video(
    State(state): State<AppState>,
    viewer: Viewer,
    headers: HeaderMap,
    Path(id): Path<VideoId>,
) -> ApiResult<Response> {
    viewer.require_media_publisher()?;
    state
        .db
        .call(move |conn| Ok(video_service(conn).delete_video(id)?))
        .await?;
    Ok(redirect_after_form(&headers, VIDEOS_PAGE))
}
