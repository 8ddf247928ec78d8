mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{setup, unique_email};

#[tokio::test]
async fn register_login_me_logout() {
    let Some(app) = setup().await else { return };
    let email = unique_email("flow");

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({
                "name": "Flow Candidate",
                "email": email,
                "password": "password123",
                "password_confirmation": "password123",
                "role": "candidate",
                "phone": "+33 6 00 00 00 00",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["user"]["role"], "candidate");
    assert!(body["user"].get("password_hash").is_none());
    let first_token = body["token"].as_str().unwrap().to_string();

    let (status, body) = app.get("/api/me", Some(&first_token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], email.as_str());

    let (status, body) = app
        .post("/api/login", None, json!({ "email": email, "password": "password123" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let second_token = body["token"].as_str().unwrap().to_string();

    // logging in again revokes earlier tokens
    let (status, _) = app.get("/api/me", Some(&first_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/logout", Some(&second_token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get("/api/me", Some(&second_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn login_failures_are_unauthorized() {
    let Some(app) = setup().await else { return };
    let (status, body) = app
        .post(
            "/api/login",
            None,
            json!({ "email": unique_email("nobody"), "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");

    let email = unique_email("wrongpass");
    app.post(
        "/api/register",
        None,
        json!({
            "name": "Wrong Pass",
            "email": email,
            "password": "password123",
            "password_confirmation": "password123",
            "role": "company",
        }),
    )
    .await;
    let (status, _) = app
        .post("/api/login", None, json!({ "email": email, "password": "not-the-one" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_validation() {
    let Some(app) = setup().await else { return };
    let email = unique_email("dup");
    let payload = json!({
        "name": "Dup",
        "email": email,
        "password": "password123",
        "password_confirmation": "password123",
        "role": "company",
    });
    let (status, _) = app.post("/api/register", None, payload.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app.post("/api/register", None, payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());

    let (status, body) = app
        .post(
            "/api/register",
            None,
            json!({
                "name": "Self-made admin",
                "email": unique_email("admin"),
                "password": "password123",
                "password_confirmation": "password123",
                "role": "admin",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["role"].is_array());

    let (status, body) = app.post("/api/register", None, json!({ "name": "x" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn bearer_handling_on_public_and_protected_routes() {
    let Some(app) = setup().await else { return };

    let (status, _) = app.get("/api/job-offers", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/job-offers", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.get("/api/dashboard", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/job-offers"].is_object());
}
