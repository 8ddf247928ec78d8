mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;

use common::{setup, PDF_BYTES};

fn download_request(id: i64, token: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(format!("/api/cv-files/{}/download", id))
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn upload_validation_uses_the_cv_file_field() {
    let Some(app) = setup().await else { return };
    let (candidate, _) = app.register("candidate").await;
    let (company, _) = app.register("company").await;

    let (status, body) = app.upload(&candidate, "resume.txt", b"plain text").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["cv_file"].is_array());

    let (status, _) = app.upload(&candidate, "resume.pdf", b"").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.upload(&candidate, "fake.pdf", b"<html></html>").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // MAX_UPLOAD_BYTES is 64 KiB in tests
    let mut big = PDF_BYTES.to_vec();
    big.resize(70 * 1024, b' ');
    let (status, body) = app.upload(&candidate, "big.pdf", &big).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", body);

    let (status, _) = app
        .post("/api/cv-files", Some(&candidate), json!({ "not": "multipart" }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app.upload(&company, "resume.pdf", PDF_BYTES).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn download_streams_the_stored_file() {
    let Some(app) = setup().await else { return };
    let (candidate, _) = app.register("candidate").await;
    let (_, body) = app.upload(&candidate, "My Resume.pdf", PDF_BYTES).await;
    let cv_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["mime_type"], "application/pdf");
    assert_eq!(body["data"]["file_size"], PDF_BYTES.len());
    assert!(body["data"].get("storage_key").is_none());

    let (status, headers, bytes) = app.send(download_request(cv_id, &candidate)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"My Resume.pdf\""
    );
    assert_eq!(bytes, PDF_BYTES);
}

#[tokio::test]
async fn companies_see_cvs_only_through_applications_to_their_offers() {
    let Some(app) = setup().await else { return };
    let (company, _) = app.register("company").await;
    let (rival, _) = app.register("company").await;
    let (candidate, _) = app.register("candidate").await;

    let (_, body) = app.upload(&candidate, "resume.pdf", PDF_BYTES).await;
    let cv_id = body["data"]["id"].as_i64().unwrap();
    let uri = format!("/api/cv-files/{}", cv_id);

    let (status, _) = app.get(&uri, Some(&company)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let offer_id = app.create_offer(&company, "CV visibility offer", "active").await;
    let (status, _) = app
        .post(
            "/api/applications",
            Some(&candidate),
            json!({ "job_offer_id": offer_id, "cv_file_id": cv_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.get(&uri, Some(&company)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["candidate"]["role"], "candidate");
    let (status, _, _) = app.send(download_request(cv_id, &company)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&uri, Some(&rival)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get("/api/cv-files", Some(&company)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/cv-files?is_active=true", Some(&candidate)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    let (_, body) = app.get("/api/cv-files?is_active=false", Some(&candidate)).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, _) = app.delete(&uri, Some(&company)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deleting_a_cv_removes_blob_and_record_and_nulls_references() {
    let Some(app) = setup().await else { return };
    let (company, _) = app.register("company").await;
    let (candidate, _) = app.register("candidate").await;

    let (_, body) = app.upload(&candidate, "resume.pdf", PDF_BYTES).await;
    let cv_id = body["data"]["id"].as_i64().unwrap();
    let storage_key: String = sqlx::query_scalar("SELECT storage_key FROM cv_files WHERE id = $1")
        .bind(cv_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();

    let offer_id = app.create_offer(&company, "CV delete offer", "active").await;
    let (_, body) = app
        .post(
            "/api/applications",
            Some(&candidate),
            json!({ "job_offer_id": offer_id, "cv_file_id": cv_id }),
        )
        .await;
    let application_id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app
        .delete(&format!("/api/cv-files/{}", cv_id), Some(&candidate))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.state.storage.exists(&storage_key).await.unwrap());

    let (status, _, _) = app.send(download_request(cv_id, &candidate)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .get(&format!("/api/applications/{}", application_id), Some(&candidate))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["cv_file_id"].is_null());

    // the store treats a second delete of the same key as done
    app.state.storage.delete(&storage_key).await.unwrap();
}

#[tokio::test]
async fn missing_blob_is_reported_as_not_found() {
    let Some(app) = setup().await else { return };
    let (candidate, _) = app.register("candidate").await;
    let (_, body) = app.upload(&candidate, "resume.pdf", PDF_BYTES).await;
    let cv_id = body["data"]["id"].as_i64().unwrap();
    let storage_key: String = sqlx::query_scalar("SELECT storage_key FROM cv_files WHERE id = $1")
        .bind(cv_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    app.state.storage.delete(&storage_key).await.unwrap();

    let (status, _, bytes) = app.send(download_request(cv_id, &candidate)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["message"], "File not found on server");
}
