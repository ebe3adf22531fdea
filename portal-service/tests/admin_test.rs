mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{TestApp, STRONG_PASSWORD};

#[tokio::test]
async fn admin_routes_require_the_api_key() {
    let app = TestApp::spawn().await;

    let missing = app.get("/admin/users", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .send(
            Request::builder()
                .uri("/admin/users")
                .header("x-admin-api-key", "not-the-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let ok = app.admin(Method::GET, "/admin/users", None).await;
    assert_eq!(ok.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_creates_staff_who_can_log_in() {
    let app = TestApp::spawn().await;

    let res = app
        .admin(
            Method::POST,
            "/admin/users",
            Some(serde_json::json!({
                "email": "head@portal.test",
                "full_name": "Nadia Karim",
                "role": "SYSTEM_ADMIN",
                "password": STRONG_PASSWORD
            })),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(res.json["user_type"], "STAFF");
    assert_eq!(res.json["is_staff"], true);
    assert_eq!(res.json["is_active"], true);
    assert_eq!(res.json["groups"], serde_json::json!(["SYSTEM_ADMIN"]));

    let login = app
        .post_form(
            "/accounts/login",
            &[("identifier", "head@portal.test"), ("password", STRONG_PASSWORD)],
            None,
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.json["redirect_to"], "/");

    let cookie = login.session_cookie().unwrap();
    let me = app.get("/accounts/me", Some(&cookie)).await;
    assert_eq!(me.json["capabilities"]["can_manage_users"], true);
    assert_eq!(me.json["capabilities"]["can_approve_courses"], true);
    assert_eq!(me.json["permissions"].as_array().unwrap().len(), 4);

    let page = app.get("/individuals/dashboard", Some(&cookie)).await;
    assert_eq!(page.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_create_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::spawn().await;
    app.signup_individual("taken@example.com", "0501234567", "1012345678")
        .await;

    let res = app
        .admin(
            Method::POST,
            "/admin/users",
            Some(serde_json::json!({
                "email": "taken@example.com",
                "full_name": "Someone Else",
                "phone": "0501234567",
                "role": "TRAINER",
                "password": "short"
            })),
        )
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!res.field_errors("email").is_empty());
    assert!(!res.field_errors("phone").is_empty());
    assert!(!res.field_errors("password").is_empty());
}

#[tokio::test]
async fn role_change_moves_the_user_between_groups() {
    let app = TestApp::spawn().await;
    let signup = app
        .signup_individual("promote@example.com", "", "1012345600")
        .await;
    let user_id = signup.json["user_id"].as_str().unwrap().to_string();

    let res = app
        .admin(
            Method::PATCH,
            &format!("/admin/users/{}", user_id),
            Some(serde_json::json!({ "role": "TRAINER", "is_active": true })),
        )
        .await;

    assert_eq!(res.status, StatusCode::OK, "{}", res.text);
    assert_eq!(res.json["role"], "TRAINER");
    assert_eq!(res.json["user_type"], "TRAINER");
    assert_eq!(res.json["groups"], serde_json::json!(["TRAINER"]));

    let fetched = app
        .admin(Method::GET, &format!("/admin/users/{}", user_id), None)
        .await;
    assert_eq!(fetched.json["groups"], serde_json::json!(["TRAINER"]));

    let missing = app
        .admin(Method::GET, "/admin/users/does-not-exist", None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_search_filters() {
    let app = TestApp::spawn().await;
    app.signup_individual("alpha@example.com", "0501000001", "1012345601")
        .await;
    app.active_individual("beta@example.com", "0501000002", "1012345602")
        .await;
    app.active_organization("gamma@example.com", "Gamma Institute")
        .await;

    let all = app.admin(Method::GET, "/admin/users", None).await;
    assert_eq!(all.json.as_array().unwrap().len(), 3);

    let individuals = app.admin(Method::GET, "/admin/users?role=IND", None).await;
    assert_eq!(individuals.json.as_array().unwrap().len(), 2);

    let active = app
        .admin(Method::GET, "/admin/users?role=IND&is_active=true", None)
        .await;
    let active = active.json.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["email"], "beta@example.com");

    let by_phone = app
        .admin(Method::GET, "/admin/users?q=0501000001", None)
        .await;
    assert_eq!(by_phone.json[0]["email"], "alpha@example.com");

    let orgs = app
        .admin(Method::GET, "/admin/profiles/organizations?q=gamma", None)
        .await;
    assert_eq!(orgs.json.as_array().unwrap().len(), 1);
    assert_eq!(orgs.json[0]["org_name"], "Gamma Institute");

    let people = app
        .admin(Method::GET, "/admin/profiles/individuals", None)
        .await;
    assert_eq!(people.json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn otp_listing_shows_state_and_never_the_code() {
    let app = TestApp::spawn().await;
    app.active_individual("done@example.com", "", "1012345610")
        .await;
    app.signup_individual("waiting@example.com", "", "1012345611")
        .await;

    let res = app.admin(Method::GET, "/admin/otps", None).await;
    assert_eq!(res.status, StatusCode::OK);
    let otps = res.json.as_array().unwrap();
    assert_eq!(otps.len(), 2);
    assert!(otps.iter().all(|o| o.get("code_hash").is_none()));

    let done = app
        .admin(Method::GET, "/admin/otps?email=done@example.com", None)
        .await;
    assert_eq!(done.json[0]["state"], "verified");
    assert_eq!(done.json[0]["user_email"], "done@example.com");

    let waiting = app
        .admin(Method::GET, "/admin/otps?is_used=false", None)
        .await;
    assert_eq!(waiting.json.as_array().unwrap().len(), 1);
    assert_eq!(waiting.json[0]["state"], "issued");

    let nobody = app
        .admin(Method::GET, "/admin/otps?email=nobody@example.com", None)
        .await;
    assert_eq!(nobody.json, serde_json::json!([]));
}

#[tokio::test]
async fn site_setting_falls_back_to_configuration() {
    let app = TestApp::spawn().await;

    let res = app.admin(Method::GET, "/admin/site-settings", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["contact_inbox_email"], "inbox@portal.test");
    assert_eq!(res.json["stored"], false);

    let bad = app
        .admin(
            Method::PUT,
            "/admin/site-settings",
            Some(serde_json::json!({ "contact_inbox_email": "not-an-email" })),
        )
        .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn bootstrap_is_idempotent_and_reset_restores_defaults() {
    let app = TestApp::spawn().await;

    let again = app
        .admin(Method::POST, "/admin/roles/bootstrap", None)
        .await;
    assert_eq!(again.status, StatusCode::OK, "{}", again.text);
    assert_eq!(again.json["created"], serde_json::json!([]));
    assert_eq!(again.json["updated"], serde_json::json!([]));

    let reset = app
        .admin(
            Method::POST,
            "/admin/roles/bootstrap",
            Some(serde_json::json!({ "reset": true })),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);
    assert_eq!(reset.json["reset"], true);
}
