mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{setup, PDF_BYTES};

#[tokio::test]
async fn dashboards_are_role_scoped() {
    let Some(app) = setup().await else { return };
    let (admin, _) = app.admin().await;
    let (company, _) = app.register("company").await;
    let (candidate, _) = app.register("candidate").await;

    let active = app.create_offer(&company, "Dashboard active", "active").await;
    app.create_offer(&company, "Dashboard closed", "closed").await;
    app.upload(&candidate, "resume.pdf", PDF_BYTES).await;
    let (_, body) = app
        .post("/api/applications", Some(&candidate), json!({ "job_offer_id": active }))
        .await;
    let application_id = body["data"]["id"].as_i64().unwrap();
    app.put(
        &format!("/api/applications/{}", application_id),
        Some(&company),
        json!({ "status": "accepted" }),
    )
    .await;

    let (status, body) = app.get("/api/dashboard", Some(&company)).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["total_job_offers"], 2);
    assert_eq!(stats["active_job_offers"], 1);
    assert_eq!(stats["total_applications"], 1);
    assert_eq!(stats["pending_applications"], 0);
    assert_eq!(stats["accepted_applications"], 1);
    assert_eq!(stats["recent_applications"][0]["id"], application_id);

    let (_, body) = app.get("/api/dashboard", Some(&candidate)).await;
    let stats = &body["data"];
    assert_eq!(stats["total_applications"], 1);
    assert_eq!(stats["accepted_applications"], 1);
    assert_eq!(stats["total_cv_files"], 1);

    let (_, body) = app.get("/api/dashboard", Some(&admin)).await;
    let stats = &body["data"];
    assert!(stats["total_users"].as_i64().unwrap() >= 3);
    assert!(stats["total_companies"].as_i64().unwrap() >= 1);
    assert!(stats["recent_job_offers"].as_array().unwrap().len() <= 5);
    assert!(stats["recent_applications"].as_array().unwrap().len() <= 5);
}
