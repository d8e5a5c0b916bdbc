use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use futures::StreamExt;
use serde_json::Value;
use tower::ServiceExt;
use victoweb_core::model::account::NewAccount;
use victoweb_core::repo::account_repo::{AccountRepository, SqliteAccountRepository};
use victoweb_core::service::account_service::AccountService;
use victoweb_core::{now_millis, open_db_in_memory, AdminRole, Settings};
use victoweb_web::events::HubChange;
use victoweb_web::{build_router, ApiError, AppState};

const FORM: &str = "application/x-www-form-urlencoded";

fn test_state() -> AppState {
    AppState::new(open_db_in_memory().expect("open db"), Settings::default())
}

/// Creates an account directly and returns a `Cookie` header value for it.
async fn session_for(state: &AppState, username: &str, is_staff: bool, role: AdminRole) -> String {
    let username = username.to_string();
    let key = state
        .db
        .call(move |conn| {
            let repo = SqliteAccountRepository::new(conn);
            let id = repo.create_account(&NewAccount {
                username,
                password_hash: "!unusable".to_string(),
                is_staff,
                admin_role: role,
                ..NewAccount::default()
            })?;
            let account = repo
                .get_account(id)?
                .ok_or_else(|| ApiError::Internal("account missing".to_string()))?;
            let grant = AccountService::new(repo).start_session(&account, now_millis(), 3600)?;
            Ok(grant.session_key)
        })
        .await
        .expect("seed account");
    format!("sessionid={key}")
}

async fn send(state: &AppState, request: Request<Body>) -> Response {
    build_router(state.clone())
        .oneshot(request)
        .await
        .expect("router is infallible")
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).expect("request")
}

fn post_form(uri: &str, body: &str, cookie: Option<&str>, htmx: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, FORM);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if htmx {
        builder = builder.header("HX-Request", "true");
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn header_str<'a>(response: &'a Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_and_public_pages_answer_anonymously() {
    let state = test_state();
    let response = send(&state, get("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, "content-type").starts_with("text/plain"));
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    assert_eq!(&body[..], b"pong");

    let response = send(&state, get("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["is_auth"], false);
    assert!(body.get("admin_hub").is_none());
    assert_eq!(body["committees"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn login_required_routes_reject_anonymous_with_401() {
    let state = test_state();
    for uri in ["/posts/", "/media.html", "/videos.html"] {
        let response = send(&state, get(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
        let body = json_body(response).await;
        assert_eq!(body["error"]["category"], "authentication");
    }
}

#[tokio::test]
async fn staff_routes_reject_regular_accounts_with_403() {
    let state = test_state();
    let cookie = session_for(&state, "student", false, AdminRole::None).await;

    let response = send(&state, get("/admin/hub", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["category"], "permission");

    let response = send(
        &state,
        post_form("/create-posts/", "title=Hi&content=Body", Some(&cookie), false),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signup_starts_a_session_and_login_rejects_bad_password() {
    let state = test_state();
    let response = send(
        &state,
        post_form(
            "/signup/",
            concat!(
                "username=mariam&full_name=Mariam+Adel&phone=01000000000",
                "&password1=Sunrise-Harbor-42&password2=Sunrise-Harbor-42",
            ),
            None,
            false,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&response, "location"), "/");
    let set_cookie = header_str(&response, "set-cookie").to_string();
    assert!(set_cookie.starts_with("sessionid="));
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap_or_default().to_string();

    let response = send(&state, get("/posts/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["current_user_name"], "mariam");

    let response = send(
        &state,
        post_form("/login/", "username=mariam&password=wrong-password", None, false),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &state,
        post_form("/login.html", "username=mariam&password=Sunrise-Harbor-42", None, true),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(header_str(&response, "hx-redirect"), "/");

    let response = send(
        &state,
        post_form(
            "/register.html",
            concat!(
                "username=mariam&full_name=Other&phone=0100",
                "&password1=Sunrise-Harbor-42&password2=Sunrise-Harbor-42",
            ),
            None,
            false,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let state = test_state();
    let cookie = session_for(&state, "leaving", false, AdminRole::None).await;

    let response = send(&state, post_form("/logout/", "", Some(&cookie), false)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&response, "location"), "/login/");
    assert!(header_str(&response, "set-cookie").contains("Max-Age=0"));

    let response = send(&state, get("/posts/", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn media_publisher_creates_post_and_reads_it_back() {
    let state = test_state();
    let cookie = session_for(&state, "media", true, AdminRole::MediaAdmin).await;

    let response = send(
        &state,
        post_form(
            "/create-posts/",
            "title=Spring+Fair&content=Hello+**world**&committee=social",
            Some(&cookie),
            false,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&response, "location"), "/posts/spring-fair");

    let response = send(&state, get("/posts/spring-fair", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["post"]["title"], "Spring Fair");
    assert!(body["rendered_content"]
        .as_str()
        .unwrap_or_default()
        .contains("<strong>world</strong>"));

    let response = send(&state, get("/committees/social.html", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["committee"]["key"], "social");
    assert_eq!(body["posts"].as_array().map(Vec::len), Some(1));

    let response = send(&state, get("/posts/missing-post", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_validation_errors_name_the_field() {
    let state = test_state();
    let cookie = session_for(&state, "media", true, AdminRole::MediaAdmin).await;
    let response = send(
        &state,
        post_form("/create-posts.html", "title=&content=x", Some(&cookie), true),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["category"], "validation");
    assert_eq!(body["error"]["field"], "title");
}

#[tokio::test]
async fn editor_preview_renders_markdown() {
    let state = test_state();
    let response = send(
        &state,
        post_form("/posts/editor/preview", "content=%23+Title", None, true),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["rendered_content"]
        .as_str()
        .unwrap_or_default()
        .contains("<h1>Title</h1>"));
}

#[tokio::test]
async fn unknown_committee_is_404() {
    let state = test_state();
    let response = send(&state, get("/committees/chess", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["category"], "not_found");
}

#[tokio::test]
async fn htmx_chat_message_returns_fragment_and_notifies_subscribers() {
    let state = test_state();
    let cookie = session_for(&state, "ops", true, AdminRole::OperationsAdmin).await;
    let mut subscription = state.hub.register();

    let response = send(
        &state,
        post_form("/admin/chat/messages/", "body=Meeting+at+five", Some(&cookie), true),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["view"], "chat");
    let messages = body["admin_hub"]["messages"].as_array().cloned().unwrap_or_default();
    assert!(messages
        .iter()
        .any(|message| message["body"] == "Meeting at five" && message["is_mine"] == true));

    let event = subscription.recv().await.unwrap_or_default();
    assert!(event.starts_with("event: chat\ndata: "));

    let response = send(
        &state,
        post_form("/admin/chat/messages/", "body=Plain+form", Some(&cookie), false),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(header_str(&response, "location"), "/admin/hub");
}

#[tokio::test]
async fn only_task_publishers_create_tasks() {
    let state = test_state();
    let ops = session_for(&state, "ops", true, AdminRole::OperationsAdmin).await;
    let president = session_for(&state, "president", true, AdminRole::UnionPresident).await;

    let response = send(
        &state,
        post_form("/admin/chat/tasks/", "title=Book+hall", Some(&ops), true),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &state,
        post_form(
            "/admin/chat/tasks/?status=todo",
            "title=Book+hall&priority=high&status=todo",
            Some(&president),
            true,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["view"], "tasks");
    assert_eq!(body["admin_hub"]["task_filter"]["status"], "todo");
    assert_eq!(body["admin_hub"]["task_summary"]["total"], 1);
    let task_id = body["admin_hub"]["tasks"][0]["id"].as_i64().unwrap_or_default();

    let response = send(
        &state,
        post_form(
            &format!("/admin/chat/tasks/{task_id}/status"),
            "status=done",
            Some(&ops),
            true,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["admin_hub"]["task_summary"]["done"], 1);

    let response = send(
        &state,
        post_form(
            &format!("/admin/chat/tasks/{task_id}/status"),
            "status=archived",
            Some(&ops),
            true,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &state,
        post_form("/admin/chat/tasks/999/delete", "", Some(&president), false),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn event_stream_starts_with_heartbeat_and_relays_changes() {
    let state = test_state();
    let cookie = session_for(&state, "ops", true, AdminRole::OperationsAdmin).await;

    let response = send(&state, get("/admin/chat/events", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "content-type"), "text/event-stream");
    assert_eq!(header_str(&response, "cache-control"), "no-cache");
    assert_eq!(header_str(&response, "x-accel-buffering"), "no");
    assert_eq!(state.hub.subscriber_count(), 1);

    let mut stream = response.into_body().into_data_stream();
    let first = stream.next().await.expect("first chunk").expect("bytes");
    assert!(first.starts_with(b"event: heartbeat\ndata: "));

    state.hub.broadcast_change(HubChange::Tasks);
    let next = stream.next().await.expect("second chunk").expect("bytes");
    assert!(next.starts_with(b"event: tasks\ndata: "));

    drop(stream);
    assert_eq!(state.hub.subscriber_count(), 0);
}
