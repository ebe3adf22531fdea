mod common;

use axum::http::StatusCode;
use common::{individual_form, organization_form, TestApp, STRONG_PASSWORD};
use portal_service::services::PortalStore;

#[tokio::test]
async fn individual_signup_creates_inactive_account_and_sends_code() {
    let app = TestApp::spawn().await;

    let res = app
        .signup_individual("sara@example.com", "0501234567", "1012345678")
        .await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
    assert_eq!(res.json["next"], "/accounts/verify-otp");
    assert_eq!(res.json["email_sent"], true);
    assert!(res.session_cookie().is_some());

    let user = app
        .store
        .find_user_by_email("sara@example.com")
        .await
        .unwrap()
        .expect("user stored");
    assert!(!user.is_active);
    assert_eq!(user.groups, vec!["IND".to_string()]);
    assert_eq!(res.json["user_id"], user.user_id.as_str());

    let profile = app
        .store
        .find_individual_profile(&user.user_id)
        .await
        .unwrap()
        .expect("profile stored");
    assert_eq!(profile.id_number, "1012345678");

    assert_eq!(app.email.sent().len(), 1);
    assert_eq!(app.last_code_for("sara@example.com").len(), 6);
}

#[tokio::test]
async fn signup_accepts_json_bodies() {
    let app = TestApp::spawn().await;

    let res = app
        .post_json(
            "/accounts/signup/individual",
            serde_json::json!({
                "email": "json@example.com",
                "full_name": "Layla Noor",
                "password1": STRONG_PASSWORD,
                "password2": STRONG_PASSWORD,
                "id_number": "2098765432"
            }),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);
}

#[tokio::test]
async fn duplicate_email_and_phone_are_field_errors() {
    let app = TestApp::spawn().await;
    app.signup_individual("dup@example.com", "0501111111", "1000000001")
        .await;

    let res = app
        .signup_individual("DUP@example.com", "0501111111", "1000000002")
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.field_errors("email"),
        vec!["A user with this email already exists."]
    );
    assert_eq!(
        res.field_errors("phone"),
        vec!["A user with this phone number already exists."]
    );
}

#[tokio::test]
async fn duplicate_id_number_is_refused() {
    let app = TestApp::spawn().await;
    app.signup_individual("first@example.com", "0502222222", "1555555555")
        .await;

    let res = app
        .signup_individual("second@example.com", "0503333333", "1555555555")
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.field_errors("id_number"),
        vec!["This ID number is already registered."]
    );
    assert!(app
        .store
        .find_user_by_email("second@example.com")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn password_rules_report_on_confirmation_field() {
    let app = TestApp::spawn().await;

    let mut form = individual_form("pw@example.com", "", "1012345679");
    form[3] = ("password1", "Tr4ining!Harbor");
    form[4] = ("password2", "Different!Harbor");
    let res = app
        .post_form("/accounts/signup/individual", &form, None)
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.field_errors("password2"),
        vec!["The two password fields didn't match."]
    );

    let mut form = individual_form("pw@example.com", "", "1012345679");
    form[3] = ("password1", "12345");
    form[4] = ("password2", "12345");
    let res = app
        .post_form("/accounts/signup/individual", &form, None)
        .await;
    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = res.field_errors("password2");
    assert!(errors.iter().any(|e| e.contains("too short")));
    assert!(errors.iter().any(|e| e.contains("entirely numeric")));
}

#[tokio::test]
async fn staff_roles_cannot_be_chosen_at_signup() {
    let app = TestApp::spawn().await;

    let mut form = individual_form("sneaky@example.com", "", "1012345600");
    form.push(("role", "SYSTEM_ADMIN"));
    let res = app
        .post_form("/accounts/signup/individual", &form, None)
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.field_errors("role"),
        vec!["This role cannot be chosen at signup."]
    );

    let mut form = individual_form("sneaky@example.com", "", "1012345600");
    form.push(("role", "ORG"));
    let res = app
        .post_form("/accounts/signup/individual", &form, None)
        .await;
    assert_eq!(
        res.field_errors("role"),
        vec!["This role is not available on this form."]
    );
}

#[tokio::test]
async fn malformed_fields_fail_validation_before_any_write() {
    let app = TestApp::spawn().await;

    let res = app
        .post_form(
            "/accounts/signup/individual",
            &individual_form("not-an-email", "12345", "12"),
            None,
        )
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!res.field_errors("email").is_empty());
    assert!(!res.field_errors("phone").is_empty());
    assert!(!res.field_errors("id_number").is_empty());
    assert!(app.email.sent().is_empty());
}

#[tokio::test]
async fn organization_signup_stores_profile_with_location() {
    let app = TestApp::spawn().await;

    let res = app
        .post_form(
            "/accounts/signup/organization",
            &organization_form("acme@example.com", "Acme Training"),
            None,
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.text);

    let user = app
        .store
        .find_user_by_email("acme@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(user.groups, vec!["ORG".to_string()]);

    let profile = app
        .store
        .find_organization_profile(&user.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(profile.org_name, "Acme Training");
    assert_eq!(profile.category.as_str(), "BUS");
    let latitude = profile.latitude.expect("latitude stored");
    assert!((latitude - 24.7136).abs() < 1e-9);
    assert_eq!(profile.location_description, "Second floor");
}

#[tokio::test]
async fn organization_name_and_coordinates_are_checked() {
    let app = TestApp::spawn().await;
    app.post_form(
        "/accounts/signup/organization",
        &organization_form("one@example.com", "Acme Training"),
        None,
    )
    .await;

    let mut form = organization_form("two@example.com", "Acme Training");
    form.retain(|(k, _)| *k != "latitude");
    form.push(("latitude", "123.5"));
    let res = app
        .post_form("/accounts/signup/organization", &form, None)
        .await;

    assert_eq!(res.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        res.field_errors("org_name"),
        vec!["An organization with this name is already registered."]
    );
    assert_eq!(
        res.field_errors("latitude"),
        vec!["Latitude must be a number between -90 and 90."]
    );
}

#[tokio::test]
async fn failed_activation_email_still_creates_account() {
    let app = TestApp::spawn().await;
    app.email.set_failure(Some("smtp down"));

    let res = app
        .signup_individual("offline@example.com", "", "1012345601")
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.json["email_sent"], false);
    assert!(app
        .store
        .find_user_by_email("offline@example.com")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = TestApp::spawn().await;

    let res = app
        .post_form("/accounts/signup/individual", &[("email", "x@example.com")], None)
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}
