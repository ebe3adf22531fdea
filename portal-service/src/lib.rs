pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    bot_detection::bot_detection_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::PortalConfig;
use crate::middleware::{metrics_middleware, ADMIN_API_KEY_HEADER};
use crate::services::{
    AccountService, AdminService, ContactService, EmailProvider, OtpService, PortalStore,
    RoleService, SessionManager, SessionStore,
};
use service_core::error::AppError;
use std::sync::Arc;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::accounts::registration::signup_individual,
        handlers::accounts::registration::signup_organization,
        handlers::accounts::activation::verify_otp,
        handlers::accounts::activation::resend_otp,
        handlers::accounts::session::login,
        handlers::accounts::session::logout,
        handlers::accounts::session::me,
        handlers::pages::individual_dashboard,
        handlers::pages::organization_dashboard,
        handlers::pages::new_support_ticket,
        handlers::pages::support_tickets,
        handlers::contact::submit_contact,
        handlers::admin::users::list_users,
        handlers::admin::users::get_user,
        handlers::admin::users::create_user,
        handlers::admin::users::update_user,
        handlers::admin::otps::list_otps,
        handlers::admin::profiles::list_individual_profiles,
        handlers::admin::profiles::list_organization_profiles,
        handlers::admin::profiles::list_contact_messages,
        handlers::admin::settings::get_site_setting,
        handlers::admin::settings::update_site_setting,
        handlers::admin::settings::bootstrap_roles,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::accounts::IndividualSignupForm,
            dtos::accounts::OrganizationSignupForm,
            dtos::accounts::SignupResponse,
            dtos::accounts::VerifyOtpForm,
            dtos::accounts::ResendOtpResponse,
            dtos::accounts::LoginForm,
            dtos::accounts::SignedInResponse,
            dtos::accounts::MessageResponse,
            dtos::accounts::Capabilities,
            dtos::accounts::MeResponse,
            dtos::accounts::PageResponse,
            dtos::contact::ContactForm,
            dtos::contact::ContactResponse,
            dtos::admin::CreateUserRequest,
            dtos::admin::UpdateUserRequest,
            dtos::admin::OtpResponse,
            dtos::admin::IndividualProfileResponse,
            dtos::admin::OrganizationProfileResponse,
            dtos::admin::ContactMessageResponse,
            dtos::admin::SiteSettingResponse,
            dtos::admin::UpdateSiteSettingRequest,
            dtos::admin::BootstrapRolesRequest,
            services::roles::BootstrapReport,
            models::UserResponse,
            models::Role,
            models::UserType,
            models::Permission,
            models::OtpState,
            models::OrganizationCategory,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Accounts", description = "Signup, activation and session login"),
        (name = "Pages", description = "Role-gated pages"),
        (name = "Contact", description = "Public contact form"),
        (name = "Admin", description = "Back-office operations"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(ADMIN_API_KEY_HEADER))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub store: Arc<dyn PortalStore>,
    pub email: Arc<dyn EmailProvider>,
    pub sessions: SessionManager,
    pub accounts: AccountService,
    pub contact: ContactService,
    pub admin: AdminService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub resend_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire the services over the given backends. Tests pass in-memory
    /// stores; `main` passes MongoDB, Redis and SMTP.
    pub fn new(
        config: PortalConfig,
        store: Arc<dyn PortalStore>,
        email: Arc<dyn EmailProvider>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let roles = RoleService::new(store.clone());
        let otp = OtpService::new(store.clone(), email.clone(), config.otp.clone());
        let accounts = AccountService::new(store.clone(), roles.clone(), otp);
        let contact = ContactService::new(store.clone(), email.clone(), config.contact.clone());
        let admin = AdminService::new(
            store.clone(),
            accounts.clone(),
            roles,
            contact.clone(),
            config.otp.max_attempts,
        );
        let sessions = SessionManager::new(
            session_store,
            config.session.ttl_seconds,
            config.security.secure_cookie,
        );

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let register_rate_limiter =
            create_ip_rate_limiter(limits.register_attempts, limits.register_window_seconds);
        let resend_rate_limiter =
            create_ip_rate_limiter(limits.resend_attempts, limits.resend_window_seconds);
        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config,
            store,
            email,
            sessions,
            accounts,
            contact,
            admin,
            login_rate_limiter,
            register_rate_limiter,
            resend_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route(
            "/admin/users",
            get(handlers::admin::list_users).post(handlers::admin::create_user),
        )
        .route(
            "/admin/users/:user_id",
            get(handlers::admin::get_user).patch(handlers::admin::update_user),
        )
        .route("/admin/otps", get(handlers::admin::list_otps))
        .route(
            "/admin/profiles/individuals",
            get(handlers::admin::list_individual_profiles),
        )
        .route(
            "/admin/profiles/organizations",
            get(handlers::admin::list_organization_profiles),
        )
        .route(
            "/admin/contact-messages",
            get(handlers::admin::list_contact_messages),
        )
        .route(
            "/admin/site-settings",
            get(handlers::admin::get_site_setting).put(handlers::admin::update_site_setting),
        )
        .route("/admin/roles/bootstrap", post(handlers::admin::bootstrap_roles))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let login_route = Router::new()
        .route("/accounts/login", post(handlers::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let signup_routes = Router::new()
        .route(
            "/accounts/signup/individual",
            post(handlers::signup_individual),
        )
        .route(
            "/accounts/signup/organization",
            post(handlers::signup_organization),
        )
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let resend_route = Router::new()
        .route("/accounts/resend-otp", post(handlers::resend_otp))
        .layer(from_fn_with_state(
            state.resend_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let ip_limiter = state.ip_rate_limiter.clone();

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    let swagger_enabled = match state.config.environment {
        crate::config::Environment::Dev => true,
        crate::config::Environment::Prod => match state.config.swagger.enabled {
            crate::config::SwaggerMode::Public | crate::config::SwaggerMode::Authenticated => true,
            crate::config::SwaggerMode::Disabled => false,
        },
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    }

    let app = app
        .merge(signup_routes)
        .merge(login_route)
        .merge(resend_route)
        .merge(admin_routes)
        .route("/accounts/verify-otp", post(handlers::verify_otp))
        .route("/accounts/logout", post(handlers::logout))
        .route("/accounts/me", get(handlers::me))
        .route("/individuals/dashboard", get(handlers::individual_dashboard))
        .route(
            "/organizations/dashboard",
            get(handlers::organization_dashboard),
        )
        .route("/support/tickets", get(handlers::support_tickets))
        .route("/support/tickets/new", get(handlers::new_support_ticket))
        .route("/contact", post(handlers::submit_contact))
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(bot_detection_middleware))
        .layer(cors_layer(&state.config));

    Ok(app)
}

/// Credentialed CORS for the configured front-end origins. Invalid entries
/// and the wildcard are skipped since the session cookie must be sent.
fn cors_layer(config: &PortalConfig) -> CorsLayer {
    use service_core::axum::http::{header, HeaderName, HeaderValue, Method};

    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter(|o| {
            if o.as_str() == "*" {
                tracing::warn!("Wildcard CORS origin ignored for credentialed requests");
                return false;
            }
            true
        })
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_API_KEY_HEADER),
        ])
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "MongoDB health check failed");
        AppError::ServiceUnavailable
    })?;

    state.sessions.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "mongodb": "up",
            "redis": "up"
        }
    })))
}
