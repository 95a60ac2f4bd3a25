use axum::{
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use common::types::Health;

use crate::observability;
use crate::openapi::ApiDoc;

pub mod auth;
pub mod payments;
pub mod schools;
pub mod users;

pub use auth::ServerState;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "Service healthy")))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// Build the full application router: public, auth, CRUD and payment routes
pub fn build_router(cors: CorsLayer, state: ServerState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(observability::metrics_handler));

    let auth_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", get(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/auth/updatedetails", put(auth::update_details))
        .route("/auth/updatepassword", put(auth::update_password))
        .route("/auth/forgotpassword", post(auth::forgot_password))
        .route("/auth/resetpassword/:token", put(auth::reset_password))
        .route("/auth/avatar", put(auth::upload_avatar));

    let user_routes = Router::new()
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/:id",
            get(users::get_one).put(users::update).delete(users::delete),
        );

    let school_routes = Router::new()
        .route("/schools", get(schools::list).post(schools::create))
        .route(
            "/schools/:id",
            get(schools::get_one).put(schools::update).delete(schools::delete),
        )
        .route("/schools/:id/students", post(schools::upload_students))
        .route("/schools/:id/logo", post(schools::upload_logo));

    let payment_routes = Router::new()
        .route("/payments/token", get(payments::token))
        .route("/payments/initialize", post(payments::initialize))
        .route("/payments/subscription", post(payments::subscription))
        .route("/payments/webhook", post(payments::webhook));

    public
        .merge(auth_routes)
        .merge(user_routes)
        .merge(school_routes)
        .merge(payment_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token_state,
        ))
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // span per request with method and path at INFO
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
