//! Test helpers for portal-service integration tests.
//!
//! Builds the full router over in-memory stores and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use portal_service::{
    build_router,
    config::{
        ContactConfig, Environment, MongoConfig, OtpConfig, PortalConfig, RateLimitConfig,
        RedisConfig, SecurityConfig, SessionConfig, SmtpConfig, SwaggerConfig, SwaggerMode,
    },
    middleware::ADMIN_API_KEY_HEADER,
    services::{metrics, MockEmailService, MockSessionStore, MockStore, SESSION_COOKIE},
    AppState,
};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";
pub const STRONG_PASSWORD: &str = "Tr4ining!Harbor";

pub fn test_config() -> PortalConfig {
    PortalConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "portal-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        mongodb: MongoConfig {
            uri: "mongodb://localhost:27017".to_string(),
            database: "portal_test".to_string(),
        },
        redis: RedisConfig {
            url: "redis://localhost:6379".to_string(),
        },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            port: 2525,
            user: String::new(),
            password: String::new(),
            from_email: "no-reply@portal.test".to_string(),
            from_name: "Portal".to_string(),
            implicit_tls: false,
            enabled: false,
        },
        contact: ContactConfig {
            inbox_email: "inbox@portal.test".to_string(),
            reference_prefix: "PORTAL".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            admin_api_key: TEST_ADMIN_API_KEY.to_string(),
            secure_cookie: false,
        },
        otp: OtpConfig::default(),
        session: SessionConfig { ttl_seconds: 3600 },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Public,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 5,
            login_window_seconds: 900,
            register_attempts: 3,
            register_window_seconds: 3600,
            resend_attempts: 5,
            resend_window_seconds: 600,
            global_ip_limit: 1000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
    pub json: serde_json::Value,
}

impl TestResponse {
    /// `portal_session=<id>` when the response set a live session cookie.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .find(|pair| pair.starts_with(&format!("{}=", SESSION_COOKIE)))
            .filter(|pair| pair.len() > SESSION_COOKIE.len() + 1)
            .map(str::to_string)
    }

    /// True when the response told the browser to drop the session cookie.
    pub fn clears_session(&self) -> bool {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.starts_with(&format!("{}=;", SESSION_COOKIE)) && v.contains("Max-Age=0"))
    }

    pub fn field_errors(&self, field: &str) -> Vec<String> {
        self.json["fields"][field]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MockStore>,
    pub email: Arc<MockEmailService>,
    pub sessions: Arc<MockSessionStore>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: PortalConfig) -> Self {
        metrics::init_metrics().expect("Failed to init metrics");

        let store = Arc::new(MockStore::new());
        let email = Arc::new(MockEmailService::new());
        let sessions = Arc::new(MockSessionStore::new());
        let state = AppState::new(config, store.clone(), email.clone(), sessions.clone());
        state
            .admin
            .bootstrap_roles(false)
            .await
            .expect("Failed to bootstrap roles");

        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            store,
            email,
            sessions,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let text = String::from_utf8_lossy(&bytes).to_string();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        TestResponse {
            status,
            headers,
            text,
            json,
        }
    }

    fn builder(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> TestResponse {
        let request = Self::builder(Method::GET, uri, cookie)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
        cookie: Option<&str>,
    ) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let request = Self::builder(Method::POST, uri, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        body: serde_json::Value,
        cookie: Option<&str>,
    ) -> TestResponse {
        let request = Self::builder(Method::POST, uri, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn admin(
        &self,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> TestResponse {
        let mut builder = Self::builder(method, uri, None).header(ADMIN_API_KEY_HEADER, TEST_ADMIN_API_KEY);
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// The code from the newest activation email sent to `email`.
    pub fn last_code_for(&self, email: &str) -> String {
        self.email
            .sent()
            .into_iter()
            .rev()
            .find(|m| m.to == email && m.subject.contains("activation code"))
            .and_then(|m| {
                m.body_text
                    .split_whitespace()
                    .find(|w| w.len() == 6 && w.bytes().all(|b| b.is_ascii_digit()))
                    .map(str::to_string)
            })
            .expect("No activation code sent")
    }

    pub async fn signup_individual(
        &self,
        email: &str,
        phone: &str,
        id_number: &str,
    ) -> TestResponse {
        self.post_form(
            "/accounts/signup/individual",
            &individual_form(email, phone, id_number),
            None,
        )
        .await
    }

    /// Sign up, verify the emailed code and return the signed-in cookie.
    pub async fn active_individual(&self, email: &str, phone: &str, id_number: &str) -> String {
        let signup = self.signup_individual(email, phone, id_number).await;
        assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.text);
        let cookie = signup.session_cookie().expect("No session cookie");
        let code = self.last_code_for(email);
        let verified = self
            .post_form("/accounts/verify-otp", &[("code", &code)], Some(&cookie))
            .await;
        assert_eq!(verified.status, StatusCode::OK, "{}", verified.text);
        verified.session_cookie().expect("No session cookie")
    }

    pub async fn active_organization(&self, email: &str, org_name: &str) -> String {
        let signup = self
            .post_form(
                "/accounts/signup/organization",
                &organization_form(email, org_name),
                None,
            )
            .await;
        assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.text);
        let cookie = signup.session_cookie().expect("No session cookie");
        let code = self.last_code_for(email);
        let verified = self
            .post_form("/accounts/verify-otp", &[("code", &code)], Some(&cookie))
            .await;
        assert_eq!(verified.status, StatusCode::OK, "{}", verified.text);
        verified.session_cookie().expect("No session cookie")
    }
}

pub fn individual_form<'a>(
    email: &'a str,
    phone: &'a str,
    id_number: &'a str,
) -> Vec<(&'a str, &'a str)> {
    vec![
        ("email", email),
        ("full_name", "Sara Ali"),
        ("phone", phone),
        ("password1", STRONG_PASSWORD),
        ("password2", STRONG_PASSWORD),
        ("id_number", id_number),
    ]
}

pub fn organization_form<'a>(email: &'a str, org_name: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("email", email),
        ("full_name", "Omar Haddad"),
        ("phone", ""),
        ("password1", STRONG_PASSWORD),
        ("password2", STRONG_PASSWORD),
        ("category", "BUS"),
        ("org_name", org_name),
        ("representative_name", "Omar Haddad"),
        ("representative_phone", "0559876543"),
        ("map_url", "https://maps.example.com/?q=acme"),
        ("location_description", "Second floor"),
        ("latitude", "24.7136"),
        ("longitude", "46.6753"),
    ]
}
