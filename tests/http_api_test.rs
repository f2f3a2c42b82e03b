mod common;

use std::sync::Arc;

use adgate::app::{build_router, AppState};
use adgate::clock::ManualTimeProvider;
use adgate::config::{AdminCfg, AppConfig, DbCfg, JwtCfg, PasswordCfg, ServerCfg};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use common::{init_test_db, FakePlatform, TestDb, TEST_SECRET};

const ADMIN_USER: &str = "root";
const ADMIN_PASS: &str = "Bootstrap-pass1";

struct TestApp {
    router: Router,
    clock: ManualTimeProvider,
    _db: TestDb,
}

async fn test_app() -> TestApp {
    let db = init_test_db().expect("test db");
    let clock = ManualTimeProvider::starting_now();
    let config = AppConfig {
        server: ServerCfg {
            redirect_origins: vec!["https://admin.example.com".into()],
            ..ServerCfg::default()
        },
        db: DbCfg { url: db.url.clone() },
        jwt: JwtCfg {
            secret: TEST_SECRET.into(),
            access_ttl_minutes: 15,
            ..JwtCfg::default()
        },
        password: PasswordCfg { cost: 1 },
        admin: AdminCfg {
            bootstrap_username: Some(ADMIN_USER.into()),
            bootstrap_password: Some(ADMIN_PASS.into()),
        },
        ..AppConfig::default()
    };
    let state = AppState::assemble(config, FakePlatform::new(vec![31, 32]), Arc::new(clock.clone()))
        .await
        .expect("app state");
    TestApp { router: build_router(state), clock, _db: db }
}

async fn send(app: &Router, method: Method, uri: &str, bearer: Option<&str>, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

async fn login(app: &Router) -> Value {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": ADMIN_USER, "password": ADMIN_PASS })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"].clone()
}

#[tokio::test]
async fn healthz_ok() {
    let app = test_app().await;
    let res = app
        .router
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_then_me() {
    let app = test_app().await;
    let data = login(&app.router).await;
    assert_eq!(data["expires_in"], 900);
    assert_eq!(data["user"]["username"], ADMIN_USER);

    let token = data["access_token"].as_str().unwrap();
    let (status, _, body) = send(&app.router, Method::GET, "/api/v1/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["data"]["role_key"], "admin");
    assert!(body["data"]["last_login_at"].is_string());
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = test_app().await;
    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "username": ADMIN_USER, "password": "Not-the-pass1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 100200);
}

#[tokio::test]
async fn session_errors_carry_distinct_codes() {
    let app = test_app().await;

    let (status, _, body) = send(&app.router, Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!((status, body["code"].as_i64()), (StatusCode::UNAUTHORIZED, Some(100100)));

    let (_, _, body) = send(&app.router, Method::GET, "/api/v1/auth/me", Some("not.a.jwt"), None).await;
    assert_eq!(body["code"], 100101);

    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();
    app.clock.advance(chrono::Duration::minutes(16));
    let (status, _, body) = send(&app.router, Method::GET, "/api/v1/auth/me", Some(&token), None).await;
    assert_eq!((status, body["code"].as_i64()), (StatusCode::UNAUTHORIZED, Some(100102)));
}

#[tokio::test]
async fn refresh_rotates_the_pair() {
    let app = test_app().await;
    let first = login(&app.router).await;
    let refresh_token = first["refresh_token"].as_str().unwrap();

    // a refresh token is not a session token
    let (_, _, body) = send(&app.router, Method::GET, "/api/v1/auth/me", Some(refresh_token), None).await;
    assert_eq!(body["code"], 100101);

    app.clock.advance(chrono::Duration::minutes(20));
    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/auth/refresh",
        None,
        Some(json!({ "refresh_token": refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["refresh_token"], first["refresh_token"]);

    let token = body["data"]["access_token"].as_str().unwrap();
    let (status, _, _) = send(&app.router, Method::GET, "/api/v1/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_endpoint() {
    let app = test_app().await;
    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app.router,
        Method::PUT,
        "/api/v1/auth/password",
        Some(&token),
        Some(json!({ "old_password": ADMIN_PASS, "new_password": "short" })),
    )
    .await;
    assert_eq!((status, body["code"].as_i64()), (StatusCode::BAD_REQUEST, Some(100204)));

    let (status, _, _) = send(
        &app.router,
        Method::PUT,
        "/api/v1/auth/password",
        Some(&token),
        Some(json!({ "old_password": ADMIN_PASS, "new_password": "Brand-new-pass2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn oauth_url_requires_admin_session() {
    let app = test_app().await;
    let (status, _, _) = send(&app.router, Method::GET, "/api/v1/platform/oauth/url", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();
    let (status, _, body) = send(&app.router, Method::GET, "/api/v1/platform/oauth/url", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let state = body["data"]["state"].as_str().unwrap();
    assert!(body["data"]["auth_url"].as_str().unwrap().contains(state));
}

#[tokio::test]
async fn callback_links_and_redirects_once() {
    let app = test_app().await;
    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();

    let (_, _, body) = send(
        &app.router,
        Method::GET,
        "/api/v1/platform/oauth/url?redirect_url=https%3A%2F%2Fadmin.example.com%2Fdone",
        Some(&token),
        None,
    )
    .await;
    let state = body["data"]["state"].as_str().unwrap().to_string();
    let callback = format!("/api/v1/platform/oauth/callback?auth_code=code1&state={state}");

    let (status, headers, _) = send(&app.router, Method::GET, &callback, None, None).await;
    assert_eq!(status, StatusCode::FOUND);
    let location = headers.get(header::LOCATION).unwrap().to_str().unwrap();
    assert_eq!(location, "https://admin.example.com/done?auth_result=success&advertiser_count=2");

    let (status, _, body) = send(&app.router, Method::GET, &callback, None, None).await;
    assert_eq!((status, body["code"].as_i64()), (StatusCode::BAD_REQUEST, Some(200104)));
}

#[tokio::test]
async fn redirect_to_unknown_origin_is_refused() {
    let app = test_app().await;
    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();

    for target in ["https%3A%2F%2Fevil.example.net%2Fsteal", "not-a-url"] {
        let uri = format!("/api/v1/platform/oauth/url?redirect_url={target}");
        let (status, _, _) = send(&app.router, Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{target}");
    }
}

#[tokio::test]
async fn callback_replaces_existing_result_params() {
    let app = test_app().await;
    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();

    let (_, _, body) = send(
        &app.router,
        Method::GET,
        "/api/v1/platform/oauth/url?redirect_url=https%3A%2F%2Fadmin.example.com%2Fdone%3Fauth_result%3Dfailed",
        Some(&token),
        None,
    )
    .await;
    let state = body["data"]["state"].as_str().unwrap().to_string();
    let callback = format!("/api/v1/platform/oauth/callback?auth_code=code1&state={state}");

    let (status, headers, _) = send(&app.router, Method::GET, &callback, None, None).await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(
        headers.get(header::LOCATION).unwrap().to_str().unwrap(),
        "https://admin.example.com/done?auth_result=success&advertiser_count=2"
    );
}

#[tokio::test]
async fn callback_without_redirect_answers_json() {
    let app = test_app().await;
    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();

    let (_, _, body) = send(&app.router, Method::GET, "/api/v1/platform/oauth/url", Some(&token), None).await;
    let state = body["data"]["state"].as_str().unwrap().to_string();

    let uri = format!("/api/v1/platform/oauth/callback?auth_code=code1&state={state}");
    let (status, _, body) = send(&app.router, Method::GET, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["advertiser_ids"], json!([31, 32]));
}

#[tokio::test]
async fn callback_requires_code_and_state() {
    let app = test_app().await;
    let (status, _, _) = send(&app.router, Method::GET, "/api/v1/platform/oauth/callback?state=abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = send(&app.router, Method::GET, "/api/v1/platform/oauth/callback?auth_code=x", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_refresh_and_unlink() {
    let app = test_app().await;
    let token = login(&app.router).await["access_token"].as_str().unwrap().to_string();

    let (status, _, body) = send(
        &app.router,
        Method::POST,
        "/api/v1/platform/oauth/refresh",
        Some(&token),
        Some(json!({ "advertiser_id": 31 })),
    )
    .await;
    assert_eq!((status, body["code"].as_i64()), (StatusCode::NOT_FOUND, Some(200100)));

    let (_, _, body) = send(&app.router, Method::GET, "/api/v1/platform/oauth/url", Some(&token), None).await;
    let state = body["data"]["state"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/platform/oauth/callback?auth_code=code1&state={state}");
    send(&app.router, Method::GET, &uri, None, None).await;

    let (status, _, _) = send(
        &app.router,
        Method::POST,
        "/api/v1/platform/oauth/refresh",
        Some(&token),
        Some(json!({ "advertiser_id": 31 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app.router, Method::DELETE, "/api/v1/platform/advertisers/31/link", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(
        &app.router,
        Method::POST,
        "/api/v1/platform/oauth/refresh",
        Some(&token),
        Some(json!({ "advertiser_id": 31 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
