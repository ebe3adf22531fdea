mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::TestApp;

#[tokio::test]
async fn health_reports_backends() {
    let app = TestApp::spawn().await;

    let res = app.get("/health", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["status"], "healthy");
    assert_eq!(res.json["service"], "portal-service");
    assert_eq!(res.json["checks"]["mongodb"], "up");
    assert_eq!(res.json["checks"]["redis"], "up");
}

#[tokio::test]
async fn metrics_expose_request_counters() {
    let app = TestApp::spawn().await;
    app.get("/health", None).await;

    let res = app.get("/metrics", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.text.contains("http_requests_total"));
}

#[tokio::test]
async fn openapi_document_lists_account_routes() {
    let app = TestApp::spawn().await;

    let res = app.get("/.well-known/openapi.json", None).await;

    assert_eq!(res.status, StatusCode::OK);
    assert!(res.json["paths"]["/accounts/login"].is_object());
    assert!(res.json["paths"]["/admin/users"].is_object());
    assert!(res.json["components"]["securitySchemes"]["admin_api_key"].is_object());
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let app = TestApp::spawn().await;

    let res = app.get("/health", None).await;

    assert!(res.headers.contains_key("x-content-type-options"));
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn known_bots_are_turned_away() {
    let app = TestApp::spawn().await;

    let res = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/accounts/login")
                .header(header::USER_AGENT, "python-requests/2.31")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("identifier=a%40example.com&password=x"))
                .unwrap(),
        )
        .await;

    assert_eq!(res.status, StatusCode::FORBIDDEN);
}
