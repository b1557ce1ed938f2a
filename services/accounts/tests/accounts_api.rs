use std::sync::Arc;

use accounts::{
    AccountService, AppState,
    avatar::AvatarStore,
    create_router,
    models::{AccountStatus, Role, AccountChanges},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::{AccountRepository, MemoryAccountRepository},
};
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use common::session::{MemoryTokenStore, SessionIssuer};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    accounts: MemoryAccountRepository,
    media: TempDir,
}

fn test_app_with_limits(limits: RateLimiterConfig) -> TestApp {
    let accounts = MemoryAccountRepository::new();
    let media = tempfile::tempdir().unwrap();
    let service = AccountService::new(
        Arc::new(accounts.clone()),
        SessionIssuer::new(Arc::new(MemoryTokenStore::new())),
        AvatarStore::new(media.path()),
        RateLimiter::new(limits),
    );
    let router = create_router(AppState {
        service,
        db_pool: None,
    });
    TestApp {
        router,
        accounts,
        media,
    }
}

fn test_app() -> TestApp {
    test_app_with_limits(RateLimiterConfig::default())
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn multipart_put(token: &str, fields: &[(&str, &str)], avatar: Option<(&str, &[u8])>) -> Request<Body> {
    let boundary = "vibes-test-boundary";
    let mut body: Vec<u8> = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, bytes)) = avatar {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("PUT")
        .uri("/api/v1/update-profile")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .header(header::AUTHORIZATION, format!("Token {}", token))
        .body(Body::from(body))
        .unwrap()
}

fn radhika() -> Value {
    json!({
        "username": "radhika",
        "email": "radhika@gmail.com",
        "password": "testpassword123",
        "first_name": "Radhika",
        "last_name": "Soni",
        "city": "New York",
        "country": "USA"
    })
}

async fn register(app: &TestApp, body: Value) -> String {
    let (status, body) = send(app, post_json("/api/v1/register", body, None)).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn set_status(app: &TestApp, username: &str, status: AccountStatus) {
    let account = app.accounts.find_by_username(username).await.unwrap().unwrap();
    app.accounts.set_status(account.id(), status).await.unwrap();
}

async fn status_of(app: &TestApp, username: &str) -> AccountStatus {
    let account = app.accounts.find_by_username(username).await.unwrap().unwrap();
    account.profile.status
}

fn login_body() -> Value {
    json!({"email": "radhika@gmail.com", "password": "testpassword123"})
}

#[tokio::test]
async fn register_returns_created_envelope_with_token() {
    let app = test_app();
    let (status, body) = send(&app, post_json("/api/v1/register", radhika(), None)).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], true);
    assert_eq!(body["message"], "Registered Successfully");
    assert_eq!(body["data"]["username"], "radhika");
    assert_eq!(body["data"]["email"], "radhika@gmail.com");
    assert_eq!(body["token"].as_str().unwrap().len(), 40);

    let account = app.accounts.find_by_username("radhika").await.unwrap().unwrap();
    assert_eq!(account.profile.city.as_deref(), Some("New York"));
    assert_eq!(account.profile.status, AccountStatus::Active);
}

#[tokio::test]
async fn duplicate_username_or_email_is_rejected() {
    let app = test_app();
    register(&app, radhika()).await;

    let mut same_username = radhika();
    same_username["email"] = json!("other@gmail.com");
    let (status, body) = send(&app, post_json("/api/v1/register", same_username, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(body["errors"], "A user with this username already exists.");

    let mut same_email = radhika();
    same_email["username"] = json!("someone");
    let (status, body) = send(&app, post_json("/api/v1/register", same_email, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "A user with this email already exists.");

    let (status, body) = send(&app, post_json("/api/v1/register", radhika(), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        "A user with this username and email already exists."
    );
}

#[tokio::test]
async fn password_length_boundary() {
    let app = test_app();

    let mut short = radhika();
    short["password"] = json!("12345");
    let (status, body) = send(&app, post_json("/api/v1/register", short, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "Ensure this field has at least 6 characters.");
    assert!(body.get("token").is_none());

    let mut exact = radhika();
    exact["password"] = json!("123456");
    register(&app, exact).await;
}

#[tokio::test]
async fn malformed_json_uses_the_envelope() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], false);
    assert_eq!(body["message"], "Validation Error");
}

#[tokio::test]
async fn login_returns_the_registration_token() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let (status, body) = send(&app, post_json("/api/v1/login", login_body(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["token"], token.as_str());
    assert_eq!(body["data"]["username"], "radhika");
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = test_app();
    register(&app, radhika()).await;

    let body = json!({"email": "radhika@gmail.com", "password": "wrong-password"});
    let (status, body) = send(&app, post_json("/api/v1/login", body, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
    assert_eq!(body["errors"], "Incorrect email or password.");
}

#[tokio::test]
async fn login_without_credentials_is_a_validation_error() {
    let app = test_app();
    let (status, body) = send(&app, post_json("/api/v1/login", json!({}), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "email, password fields are required.");
}

#[tokio::test]
async fn suspended_login_is_forbidden_and_leaves_status_alone() {
    let app = test_app();
    register(&app, radhika()).await;
    set_status(&app, "radhika", AccountStatus::Suspended).await;

    let (status, body) = send(&app, post_json("/api/v1/login", login_body(), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Account Suspended");
    assert_eq!(body["errors"], "This account is suspended.");
    assert!(body.get("token").is_none());
    assert_eq!(status_of(&app, "radhika").await, AccountStatus::Suspended);
}

#[tokio::test]
async fn deleted_login_is_forbidden() {
    let app = test_app();
    register(&app, radhika()).await;
    set_status(&app, "radhika", AccountStatus::Deleted).await;

    let (status, body) = send(&app, post_json("/api/v1/login", login_body(), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Account Deleted");
    assert_eq!(status_of(&app, "radhika").await, AccountStatus::Deleted);
}

#[tokio::test]
async fn logout_then_login_reactivates() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let (status, body) = send(&app, post_json("/api/v1/logout", json!({}), Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User 'radhika' logged out successfully");
    assert_eq!(status_of(&app, "radhika").await, AccountStatus::LoggedOut);

    // The revoked token no longer authenticates
    let (status, body) = send(&app, post_json("/api/v1/logout", json!({}), Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"], "Invalid token.");

    let (status, body) = send(&app, post_json("/api/v1/login", login_body(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["token"], token.as_str());
    assert_eq!(status_of(&app, "radhika").await, AccountStatus::Active);
}

#[tokio::test]
async fn logout_requires_a_token() {
    let app = test_app();
    let (status, body) = send(&app, post_json("/api/v1/logout", json!({}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["errors"],
        "Authentication credentials were not provided."
    );
}

#[tokio::test]
async fn repeated_failures_are_throttled() {
    let app = test_app_with_limits(RateLimiterConfig {
        max_attempts: 2,
        window_seconds: 300,
        ban_duration_seconds: 300,
    });
    register(&app, radhika()).await;

    let wrong = json!({"email": "radhika@gmail.com", "password": "wrong-password"});
    for _ in 0..2 {
        let (status, _) = send(&app, post_json("/api/v1/login", wrong.clone(), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send(&app, post_json("/api/v1/login", login_body(), None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["message"], "Too Many Attempts");
}

#[tokio::test]
async fn apple_flow_registers_then_logs_in() {
    let app = test_app();
    let body = json!({
        "apple_id": "001025.44a3a4e14fae4b51a2e7bc437c58db3c.0100",
        "email": "user@example.com",
        "first_name": "John",
        "last_name": "Appleseed"
    });

    let (status, first) = send(&app, post_json("/api/v1/apple-login", body.clone(), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "User registered successfully");
    assert_eq!(first["data"]["username"], "apple_001025.44a");

    let (status, second) = send(&app, post_json("/api/v1/apple-login", body, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["message"], "User logged in successfully");
    assert_eq!(second["token"], first["token"]);

    let account = app
        .accounts
        .find_by_username("apple_001025.44a")
        .await
        .unwrap()
        .unwrap();
    assert!(account.profile.is_external_only);
    assert!(!account.user.has_usable_password());
}

#[tokio::test]
async fn apple_id_login_and_unknown_apple_id() {
    let app = test_app();
    let body = json!({"apple_id": "000111.abcdef"});
    send(&app, post_json("/api/v1/apple-login", body, None)).await;

    let (status, body) = send(
        &app,
        post_json("/api/v1/login", json!({"apple_id": "000111.abcdef"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "apple_000111.abc");

    let (status, body) = send(
        &app,
        post_json("/api/v1/login", json!({"apple_id": "unknown"}), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"], "Invalid Apple ID.");
}

#[tokio::test]
async fn apple_flow_with_taken_email_is_a_duplicate_entry() {
    let app = test_app();
    register(&app, radhika()).await;

    let body = json!({"apple_id": "999999.zzz", "email": "radhika@gmail.com"});
    let (status, body) = send(&app, post_json("/api/v1/apple-login", body, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Duplicate entry");
    assert_eq!(body["errors"], "A user with this email already exists.");
}

#[tokio::test]
async fn apple_flow_respects_suspension() {
    let app = test_app();
    let body = json!({"apple_id": "000222.suspended"});
    send(&app, post_json("/api/v1/apple-login", body.clone(), None)).await;
    set_status(&app, "apple_000222.sus", AccountStatus::Suspended).await;

    let (status, body) = send(&app, post_json("/api/v1/apple-login", body, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Account Suspended");
}

#[tokio::test]
async fn update_own_profile_with_avatar() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let request = multipart_put(
        &token,
        &[("username", "radhika"), ("city", "Boston"), ("phone", "1234567890")],
        Some(("me.png", &[0x89, 0x50, 0x4e, 0x47])),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["message"], "Profile updated successfully.");

    let account = app.accounts.find_by_username("radhika").await.unwrap().unwrap();
    assert_eq!(account.profile.city.as_deref(), Some("Boston"));
    assert_eq!(account.profile.country.as_deref(), Some("USA"));
    let avatar = account.profile.avatar.unwrap();
    assert!(avatar.starts_with("avatar/"));
    assert!(app.media.path().join(avatar).exists());
}

#[tokio::test]
async fn update_profile_identifier_rules() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let (status, body) = send(&app, multipart_put(&token, &[("city", "Boston")], None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["errors"],
        "Username or email is required to identify the user."
    );

    let (status, body) = send(&app, multipart_put(&token, &[("username", "ghost")], None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"], "User not found.");

    let (status, _) = send(
        &app,
        multipart_put(&token, &[("email", "radhika@gmail.com"), ("last_name", "S")], None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn update_profile_rejects_non_images() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let request = multipart_put(&token, &[("username", "radhika")], Some(("me.exe", b"MZ")));
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"].as_str().unwrap().starts_with("Upload a valid image."));
}

#[tokio::test]
async fn failed_update_leaves_no_avatar_behind() {
    let app = test_app();
    let token = register(&app, radhika()).await;
    let mut other = radhika();
    other["username"] = json!("priya");
    other["email"] = json!("priya@gmail.com");
    register(&app, other).await;

    let request = multipart_put(
        &token,
        &[("username", "radhika"), ("email", "priya@gmail.com")],
        Some(("me.png", &[0x89, 0x50, 0x4e, 0x47])),
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "A user with this email already exists.");

    let account = app.accounts.find_by_username("radhika").await.unwrap().unwrap();
    assert!(account.profile.avatar.is_none());
    let stored = std::fs::read_dir(app.media.path().join("avatar"))
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn oversized_profile_fields_are_rejected() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let long_phone = "9".repeat(256);
    let long_name = "L".repeat(151);
    let request = multipart_put(
        &token,
        &[("username", "radhika"), ("phone", long_phone.as_str()), ("last_name", long_name.as_str())],
        None,
    );
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation Error");
    assert_eq!(
        body["errors"],
        "Ensure this field has no more than 150 characters. \
         Ensure this field has no more than 255 characters."
    );

    let mut oversized = radhika();
    oversized["username"] = json!("meera");
    oversized["email"] = json!("meera@gmail.com");
    oversized["address"] = json!("a".repeat(256));
    let (status, body) = send(&app, post_json("/api/v1/register", oversized, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "Ensure this field has no more than 255 characters.");
    assert!(app.accounts.find_by_username("meera").await.unwrap().is_none());
}

#[tokio::test]
async fn only_admins_update_other_accounts() {
    let app = test_app();
    let token = register(&app, radhika()).await;
    let mut other = radhika();
    other["username"] = json!("priya");
    other["email"] = json!("priya@gmail.com");
    let other_token = register(&app, other).await;

    let (status, body) = send(&app, multipart_put(&other_token, &[("username", "radhika"), ("city", "X")], None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Permission denied");

    let (status, _) = send(&app, multipart_put(&token, &[("username", "radhika"), ("role", "admin")], None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let priya = app.accounts.find_by_username("priya").await.unwrap().unwrap();
    let promote = AccountChanges {
        role: Some(Role::Admin),
        ..AccountChanges::default()
    };
    app.accounts.update(priya.id(), &promote).await.unwrap();

    let (status, _) = send(&app, multipart_put(&other_token, &[("username", "radhika"), ("city", "X")], None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.accounts
            .find_by_username("radhika")
            .await
            .unwrap()
            .unwrap()
            .profile
            .city
            .as_deref(),
        Some("X")
    );
}

#[tokio::test]
async fn change_password_checks_the_current_one() {
    let app = test_app();
    let token = register(&app, radhika()).await;

    let wrong = json!({"current_password": "nope-nope", "new_password": "brandnew123"});
    let (status, body) = send(&app, post_json("/api/v1/change-password", wrong, Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password doesn't match!");

    let weak = json!({"current_password": "testpassword123", "new_password": "123"});
    let (status, body) = send(&app, post_json("/api/v1/change-password", weak, Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"], "Ensure this field has at least 6 characters.");

    let good = json!({"current_password": "testpassword123", "new_password": "brandnew123"});
    let (status, _) = send(&app, post_json("/api/v1/change-password", good, Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, post_json("/api/v1/login", login_body(), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let fresh = json!({"email": "radhika@gmail.com", "password": "brandnew123"});
    let (status, _) = send(&app, post_json("/api/v1/login", fresh, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_app();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
