use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wicket::config::Config;

fn test_config(rotation_secs: u64) -> Config {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    config.server.secure_cookies = false;
    config.security.session_rotation_secs = rotation_secs;
    // Cheap Argon2 params keep the test suite fast
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

async fn spawn_app() -> Router {
    spawn_app_with_rotation(1800).await
}

async fn spawn_app_with_rotation(rotation_secs: u64) -> Router {
    let state = wicket::api::create_app_state(test_config(rotation_secs))
        .await
        .expect("Failed to create app state");
    wicket::api::router(state)
}

fn json_request(uri: &str, body: serde_json::Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    builder.body(Body::empty()).unwrap()
}

/// Extract the session cookie pair (`id=...`) from a response
fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|s| s.starts_with("id="))
        .map(|s| s.split(';').next().unwrap().to_string())
}

fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn register_body(username: &str, email: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "username": username, "email": email, "password": password })
}

fn login_body(username: &str, password: &str) -> serde_json::Value {
    serde_json::json!({ "username": username, "password": password })
}

async fn register(app: &Router, username: &str, email: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(json_request(
            "/auth/register",
            register_body(username, email, password),
            None,
        ))
        .await
        .unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> Response<Body> {
    app.clone()
        .oneshot(json_request(
            "/auth/login",
            login_body(username, password),
            None,
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_register_then_login_establishes_session() {
    let app = spawn_app().await;

    let response = register(&app, "alice", "alice@example.com", "correctpassword").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    let response = login(&app, "alice", "correctpassword").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
    let cookie = session_cookie(&response).expect("login should set a session cookie");

    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["data"]["username"], "alice");
    assert_eq!(body_json["data"]["email"], "alice@example.com");
    assert!(body_json["data"]["last_login"].is_string());
}

#[tokio::test]
async fn test_register_validation_order() {
    let app = spawn_app().await;

    let response = register(&app, "", "a@example.com", "longenough").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(&app, "bob", "not-an-email", "longenough").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = register(&app, "bob", "bob@example.com", "short").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was persisted along the way
    let response = login(&app, "bob", "longenough").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = spawn_app().await;

    let response = register(&app, "carol", "carol@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // Same username, different email
    let response = register(&app, "carol", "other@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Different username, same email
    let response = register(&app, "dave", "carol@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The conflicting attempts created no records
    let response = login(&app, "dave", "password123").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_errors_resist_enumeration() {
    let app = spawn_app().await;

    let response = register(&app, "erin", "erin@example.com", "password123").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let wrong_password = login(&app, "erin", "not-the-password").await;
    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);

    let unknown_user = login(&app, "nosuchuser", "not-the-password").await;
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);

    // Empty credentials fail the same way, for known and unknown names alike
    let empty_password = login(&app, "erin", "").await;
    assert_eq!(empty_password.status(), StatusCode::UNAUTHORIZED);

    let empty_username = login(&app, "", "password123").await;
    assert_eq!(empty_username.status(), StatusCode::UNAUTHORIZED);

    // Byte-identical error bodies for every failure mode
    let body_a = wrong_password.into_body().collect().await.unwrap().to_bytes();
    let body_b = unknown_user.into_body().collect().await.unwrap().to_bytes();
    let body_c = empty_password.into_body().collect().await.unwrap().to_bytes();
    let body_d = empty_username.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(body_a, body_b);
    assert_eq!(body_a, body_c);
    assert_eq!(body_a, body_d);
}

#[tokio::test]
async fn test_duplicate_insert_rejected_by_unique_index() {
    // Drive the store directly, skipping the handler's existence check:
    // this is the path a concurrent duplicate registration takes when both
    // requests pass the check before either inserts.
    let store = wicket::db::Store::new("sqlite::memory:")
        .await
        .expect("Failed to create store");

    store
        .create_user("kim", "kim@example.com", "phc-hash-a".to_string())
        .await
        .expect("First insert should succeed");

    let err = store
        .create_user("kim", "kim-alt@example.com", "phc-hash-b".to_string())
        .await
        .expect_err("Duplicate username must be rejected");
    assert!(matches!(err, wicket::db::CreateUserError::Duplicate));

    let err = store
        .create_user("kim-alt", "kim@example.com", "phc-hash-c".to_string())
        .await
        .expect_err("Duplicate email must be rejected");
    assert!(matches!(err, wicket::db::CreateUserError::Duplicate));

    // The losing inserts left no record behind
    assert!(
        store
            .get_user_by_username("kim-alt")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_login_rotates_session_id() {
    let app = spawn_app().await;

    let response = register(&app, "frank", "frank@example.com", "password123").await;
    let anon_cookie = session_cookie(&response).expect("registration should set a session cookie");

    // Log in while presenting the anonymous session
    let response = app
        .clone()
        .oneshot(json_request(
            "/auth/login",
            login_body("frank", "password123"),
            Some(&anon_cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let auth_cookie = session_cookie(&response).expect("login should set a session cookie");
    assert_ne!(anon_cookie, auth_cookie, "session id must change at login");

    // The pre-login id no longer grants access
    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&anon_cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_login_is_idempotent_when_authenticated() {
    let app = spawn_app().await;

    register(&app, "grace", "grace@example.com", "password123").await;
    let response = login(&app, "grace", "password123").await;
    let cookie = session_cookie(&response).unwrap();

    // Second login with an authenticated session short-circuits, even with
    // garbage credentials
    let response = app
        .clone()
        .oneshot(json_request(
            "/auth/login",
            login_body("grace", "wrong-password"),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard");
}

#[tokio::test]
async fn test_stale_session_id_is_rotated() {
    // One-second window so staleness is reachable in a test
    let app = spawn_app_with_rotation(1).await;

    register(&app, "heidi", "heidi@example.com", "password123").await;
    let response = login(&app, "heidi", "password123").await;
    let cookie = session_cookie(&response).unwrap();

    // Within the window the id stays put
    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie(&response).unwrap(), cookie);

    tokio::time::sleep(std::time::Duration::from_secs(2)).await;

    // Past the window the gate issues a fresh id and the request still passes
    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = session_cookie(&response).unwrap();
    assert_ne!(rotated, cookie, "stale session id must be rotated");

    // The rotated session keeps its data
    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&rotated)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["data"]["username"], "heidi");
}

#[tokio::test]
async fn test_fresh_session_id_is_left_alone() {
    let app = spawn_app().await;

    register(&app, "ivan", "ivan@example.com", "password123").await;
    let response = login(&app, "ivan", "password123").await;
    let cookie = session_cookie(&response).unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(session_cookie(&response).unwrap(), cookie);
}

#[tokio::test]
async fn test_logout_destroys_session() {
    let app = spawn_app().await;

    register(&app, "judy", "judy@example.com", "password123").await;
    let response = login(&app, "judy", "password123").await;
    let cookie = session_cookie(&response).unwrap();

    let response = app
        .clone()
        .oneshot(get_request("/auth/logout", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");

    // The old session no longer authorizes anything
    let response = app
        .clone()
        .oneshot(get_request("/dashboard", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_logout_without_session_still_redirects() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/auth/logout", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}

#[tokio::test]
async fn test_dashboard_requires_authentication() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(get_request("/dashboard", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/login");
}
