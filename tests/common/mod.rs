#![allow(dead_code)]

use std::env;
use std::sync::Once;

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use jobboard_backend::{config, database, routes, AppState};
use serde_json::{json, Value as JsonValue};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

static INIT: Once = Once::new();

pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub state: AppState,
}

/// Builds the full router against `DATABASE_URL`. Returns `None` (and says
/// so) when no database is configured.
pub async fn setup() -> Option<TestApp> {
    dotenvy::dotenv().ok();
    if env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL is not set; skipping database-backed test");
        return None;
    }

    INIT.call_once(|| {
        env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
        env::set_var("JWT_SECRET", "integration_test_secret");
        env::set_var("PUBLIC_RPS", "100000");
        env::set_var("API_RPS", "100000");
        env::set_var("MAX_UPLOAD_BYTES", "65536");
        env::set_var("LOG_FORMAT", "pretty");
        env::set_var(
            "UPLOADS_DIR",
            env::temp_dir().join(format!("jobboard-it-{}", Uuid::new_v4())),
        );
        config::init_config().expect("init config");
    });
    let config = config::get_config();

    let pool = database::pool::create_pool().await.expect("pool");
    database::pool::run_migrations(&pool)
        .await
        .expect("migrations");

    let state = AppState::new(pool.clone(), config);
    let router = routes::build_router(state.clone(), config);
    Some(TestApp {
        router,
        pool,
        state,
    })
}

pub fn unique_email(prefix: &str) -> String {
    format!("{}_{}@example.com", prefix, Uuid::new_v4().simple())
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<JsonValue>,
    ) -> (StatusCode, JsonValue) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let (status, _, bytes) = self.send(request).await;
        let json = if bytes.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null)
        };
        (status, json)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .unwrap()
            .to_vec();
        (status, headers, bytes)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, JsonValue) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: JsonValue) -> (StatusCode, JsonValue) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: JsonValue) -> (StatusCode, JsonValue) {
        self.request(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, JsonValue) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Registers a company or candidate and returns `(token, user_id)`.
    pub async fn register(&self, role: &str) -> (String, i64) {
        let (status, body) = self
            .post(
                "/api/register",
                None,
                json!({
                    "name": format!("Test {}", role),
                    "email": unique_email(role),
                    "password": "password123",
                    "password_confirmation": "password123",
                    "role": role,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    /// Creates an admin account directly and logs it in.
    pub async fn admin(&self) -> (String, i64) {
        let email = unique_email("admin");
        self.state
            .user_service
            .ensure_admin(&email, "adminpass123")
            .await
            .expect("create admin");
        let (status, body) = self
            .post(
                "/api/login",
                None,
                json!({ "email": email, "password": "adminpass123" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);
        (
            body["token"].as_str().unwrap().to_string(),
            body["user"]["id"].as_i64().unwrap(),
        )
    }

    /// Posts an offer as `token` and returns its id.
    pub async fn create_offer(&self, token: &str, title: &str, status: &str) -> i64 {
        let (code, body) = self
            .post(
                "/api/job-offers",
                Some(token),
                json!({
                    "title": title,
                    "description": "Build and run Rust services.",
                    "salary_min": 3000,
                    "salary_max": 4500,
                    "location": "Lyon",
                    "contract_type": "permanent",
                    "status": status,
                }),
            )
            .await;
        assert_eq!(code, StatusCode::CREATED, "create offer failed: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn upload(
        &self,
        token: &str,
        file_name: &str,
        content: &[u8],
    ) -> (StatusCode, JsonValue) {
        let boundary = "----jobboard-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"cv_file\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/cv-files")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, _, bytes) = self.send(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null))
    }
}

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj<<>>endobj\ntrailer<<>>\n%%EOF\n";
