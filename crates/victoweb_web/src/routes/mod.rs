//! Route table.
//!
//! Handlers check access through [`Viewer`](crate::session::Viewer) first,
//! then run one service call on the blocking pool.

use crate::state::AppState;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use rusqlite::Connection;
use victoweb_core::repo::account_repo::SqliteAccountRepository;
use victoweb_core::repo::chat_repo::SqliteChatRepository;
use victoweb_core::repo::post_repo::SqlitePostRepository;
use victoweb_core::repo::video_repo::SqliteVideoRepository;
use victoweb_core::service::account_service::AccountService;
use victoweb_core::service::chat_service::ChatService;
use victoweb_core::service::post_service::PostService;
use victoweb_core::service::video_service::VideoService;

mod accounts;
mod hub;
mod pages;
mod posts;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(pages::home))
        .route("/health", get(pages::health))
        .route("/legacy.html", get(pages::legacy))
        .route("/committees/{key}", get(pages::committee))
        .route("/login/", get(accounts::login_page).post(accounts::login))
        .route("/login.html", get(accounts::login_page).post(accounts::login))
        .route("/signup/", get(accounts::signup_page).post(accounts::signup))
        .route("/register.html", get(accounts::signup_page).post(accounts::signup))
        .route("/logout/", post(accounts::logout))
        .route("/posts/", get(posts::list_posts))
        .route("/posts.html", get(posts::list_posts))
        .route("/posts/editor/help", get(posts::editor_help))
        .route("/posts/editor/preview", post(posts::preview))
        .route("/posts/{slug}", get(posts::post_detail))
        .route("/media/", get(posts::media_gallery))
        .route("/media.html", get(posts::media_gallery))
        .route("/videos.html", get(posts::list_videos))
        .route("/create-posts/", post(posts::create_post))
        .route("/create-posts.html", post(posts::create_post))
        .route("/admin/posts/{pk}/edit", post(posts::edit_post))
        .route("/admin/posts/{pk}/delete", post(posts::delete_post))
        .route("/create-videos/", post(posts::create_video))
        .route("/create-videos.html", post(posts::create_video))
        .route("/admin/videos/{pk}/edit", post(posts::edit_video))
        .route("/admin/videos/{pk}/delete", post(posts::delete_video))
        .route("/admin/hub", get(hub::hub_page))
        .route("/admin/hub/fragment/chat", get(hub::chat_fragment))
        .route("/admin/hub/fragment/tasks", get(hub::tasks_fragment))
        .route("/admin/chat/events", get(hub::events))
        .route("/admin/chat/messages/", post(hub::create_message))
        .route("/admin/chat/messages/{pk}/delete", post(hub::delete_message))
        .route("/admin/chat/tasks/", post(hub::create_task))
        .route("/admin/chat/tasks/{pk}/status", post(hub::update_task_status))
        .route("/admin/chat/tasks/{pk}/assignment", post(hub::update_task_assignment))
        .route("/admin/chat/tasks/{pk}/todos", post(hub::add_todo))
        .route("/admin/chat/tasks/{pk}/delete", post(hub::delete_task))
        .route("/admin/chat/todos/{pk}/toggle", post(hub::toggle_todo))
}

pub(crate) fn see_other(location: &str) -> Response {
    (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
}

/// `204` + `HX-Redirect` for htmx callers, `303` otherwise.
pub(crate) fn redirect_after_form(headers: &HeaderMap, location: &str) -> Response {
    if crate::session::is_htmx(headers) {
        (StatusCode::NO_CONTENT, [("hx-redirect", location)]).into_response()
    } else {
        see_other(location)
    }
}

pub(crate) fn account_service(conn: &Connection) -> AccountService<SqliteAccountRepository<'_>> {
    AccountService::new(SqliteAccountRepository::new(conn))
}

pub(crate) fn post_service(conn: &Connection) -> PostService<SqlitePostRepository<'_>> {
    PostService::new(SqlitePostRepository::new(conn))
}

pub(crate) fn video_service(conn: &Connection) -> VideoService<SqliteVideoRepository<'_>> {
    VideoService::new(SqliteVideoRepository::new(conn))
}

pub(crate) fn chat_service(conn: &Connection) -> ChatService<SqliteChatRepository<'_>> {
    ChatService::new(SqliteChatRepository::new(conn))
}
