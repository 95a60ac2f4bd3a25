use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use axum::Extension;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use models::user::Role;
use service::auth::domain::{LoginInput, RegisterInput, UpdateDetailsInput};
use service::auth::repo::seaorm::SeaOrmAuthRepository;
use service::auth::service::{AuthConfig, AuthService};
use service::payments::repo::seaorm::SeaOrmRecordStore;
use service::payments::{gateway::GatewayClient, ReconciliationDispatcher};
use service::storage::ObjectStore;
use service::user_service;

use crate::errors::ApiError;

#[derive(Clone)]
pub struct ServerAuthConfig {
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
}

#[derive(Clone)]
pub struct ServerState {
    pub db: DatabaseConnection,
    pub auth: ServerAuthConfig,
    pub gateway: Arc<GatewayClient>,
    pub dispatcher: Arc<ReconciliationDispatcher<SeaOrmRecordStore>>,
    pub storage: Arc<dyn ObjectStore>,
    pub uploads: configs::UploadConfig,
}

/// Authenticated caller, decoded from the bearer token by the middleware and
/// injected as a request extension.
#[derive(Clone, Debug)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role != Role::Admin {
            return Err(ApiError::forbidden("admin access required"));
        }
        Ok(())
    }

    pub fn require_self_or_admin(&self, user_id: Uuid) -> Result<(), ApiError> {
        if self.user_id != user_id && self.role != Role::Admin {
            return Err(ApiError::forbidden("not authorized for this user"));
        }
        Ok(())
    }
}

pub(crate) fn auth_service(state: &ServerState) -> AuthService<SeaOrmAuthRepository> {
    AuthService::new(
        Arc::new(SeaOrmAuthRepository { db: state.db.clone() }),
        AuthConfig {
            jwt_secret: Some(state.auth.jwt_secret.clone()),
            password_algorithm: "argon2".into(),
            token_ttl_hours: state.auth.token_ttl_hours,
        },
    )
}

fn auth_cookie(token: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new("auth_token", token.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(false);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

#[derive(Serialize)]
pub struct SessionOutput {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub role: Role,
    pub token: String,
}

fn session_response(
    jar: CookieJar,
    session: service::auth::domain::AuthSession,
) -> Result<(CookieJar, Json<SessionOutput>), ApiError> {
    let user = session.user;
    let Some(token) = session.token else {
        return Err(ApiError::internal("token generation failed"));
    };
    let jar = jar.add(auth_cookie(&token));
    Ok((
        jar,
        Json(SessionOutput {
            user_id: user.id,
            email: user.email,
            first_name: user.first_name,
            role: user.role,
            token,
        }),
    ))
}

#[utoipa::path(post, path = "/auth/register", tag = "auth", request_body = crate::openapi::RegisterRequest, responses((status = 200, description = "Registered"), (status = 400, description = "Bad Request"), (status = 409, description = "Conflict")))]
pub async fn register(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(input): Json<RegisterInput>,
) -> Result<(CookieJar, Json<SessionOutput>), ApiError> {
    let session = auth_service(&state).register(input).await?;
    session_response(jar, session)
}

#[utoipa::path(post, path = "/auth/login", tag = "auth", request_body = crate::openapi::LoginRequest, responses((status = 200, description = "Logged In"), (status = 401, description = "Unauthorized")))]
pub async fn login(
    State(state): State<ServerState>,
    jar: CookieJar,
    Json(input): Json<LoginInput>,
) -> Result<(CookieJar, Json<SessionOutput>), ApiError> {
    let session = auth_service(&state).login(input).await?;
    session_response(jar, session)
}

pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let jar = jar.remove(Cookie::from("auth_token"));
    (jar, StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct MeOutput {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub school_id: Option<Uuid>,
    pub picture: String,
}

pub async fn me(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
) -> Result<Json<MeOutput>, ApiError> {
    let user = auth_service(&state).me(ctx.user_id).await?;
    Ok(Json(MeOutput {
        user_id: user.id,
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        role: user.role,
        school_id: user.school_id,
        picture: user.picture,
    }))
}

pub async fn update_details(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<UpdateDetailsInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user = auth_service(&state).update_details(ctx.user_id, input).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": { "user_id": user.id, "email": user.email, "first_name": user.first_name } })))
}

#[derive(Deserialize)]
pub struct UpdatePasswordInput {
    pub current_password: String,
    pub new_password: String,
}

pub async fn update_password(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    jar: CookieJar,
    Json(input): Json<UpdatePasswordInput>,
) -> Result<(CookieJar, Json<SessionOutput>), ApiError> {
    let session = auth_service(&state)
        .update_password(ctx.user_id, &input.current_password, &input.new_password)
        .await?;
    session_response(jar, session)
}

#[derive(Deserialize)]
pub struct ForgotPasswordInput {
    pub email: String,
}

/// Returns the reset token for out-of-band delivery; the mail channel is an
/// external collaborator.
pub async fn forgot_password(
    State(state): State<ServerState>,
    Json(input): Json<ForgotPasswordInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if input.email.trim().is_empty() {
        return Err(ApiError::bad_request("please provide an email"));
    }
    let token = auth_service(&state).forgot_password(&input.email).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": { "reset_token": token } })))
}

#[derive(Deserialize)]
pub struct ResetPasswordInput {
    pub password: String,
}

pub async fn reset_password(
    State(state): State<ServerState>,
    Path(token): Path<String>,
    jar: CookieJar,
    Json(input): Json<ResetPasswordInput>,
) -> Result<(CookieJar, Json<SessionOutput>), ApiError> {
    let session = auth_service(&state).reset_password(&token, &input.password).await?;
    session_response(jar, session)
}

/// Shared validation for image uploads (avatars, logos).
pub(crate) fn validate_image_upload(
    content_type: Option<&str>,
    size: usize,
    max_bytes: usize,
) -> Result<String, ApiError> {
    let content_type =
        content_type.ok_or_else(|| ApiError::bad_request("content-type required"))?;
    if !content_type.starts_with("image/") {
        return Err(ApiError::bad_request("please upload an image file"));
    }
    if size > max_bytes {
        return Err(ApiError::bad_request(format!(
            "please upload an image file smaller than {}mb",
            max_bytes / 1_000_000
        )));
    }
    let ext = content_type.strip_prefix("image/").unwrap_or("bin").to_string();
    Ok(ext)
}

pub async fn upload_avatar(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    headers: axum::http::HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let ext = validate_image_upload(content_type, body.len(), state.uploads.max_file_bytes)?;

    let filename = format!("{}-avatar.{ext}", ctx.user_id);
    let path = state
        .storage
        .put("avatar", &filename, content_type.unwrap_or("image/unknown"), &body)
        .await?;

    user_service::update_user(
        &state.db,
        ctx.user_id,
        user_service::UpdateUser { picture: Some(path.clone()), ..Default::default() },
    )
    .await?;
    Ok(Json(serde_json::json!({ "success": true, "data": path })))
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    uid: Option<String>,
    role: Option<String>,
    exp: Option<usize>,
}

/// Global middleware: outside the public allowlist, require a valid
/// `Authorization: Bearer <token>` (with cookie fallback) and inject the
/// decoded caller as an `AuthContext` extension.
pub async fn require_bearer_token_state(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = req.uri().path();
    let method = req.method().clone();

    // Allowlist: health/metrics, login and registration, password recovery,
    // the gateway webhook, API docs, CORS preflight
    if path == "/health"
        || path == "/metrics"
        || path == "/auth/login"
        || path == "/auth/register"
        || path == "/auth/forgotpassword"
        || path.starts_with("/auth/resetpassword/")
        || path == "/payments/webhook"
        || path.starts_with("/docs")
        || path.starts_with("/api-docs")
        || method == axum::http::Method::OPTIONS
    {
        return Ok(next.run(req).await);
    }

    // Read the Authorization header; fall back to the auth_token cookie
    let token = {
        let authz = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if let Some(h) = authz {
            let prefix = "Bearer ";
            if !h.starts_with(prefix) {
                tracing::warn!(path = %path, "invalid Authorization format (expect Bearer)");
                return Err(StatusCode::UNAUTHORIZED);
            }
            h[prefix.len()..].to_string()
        } else {
            let cookie_header = req
                .headers()
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");

            let mut token_val: Option<String> = None;
            for part in cookie_header.split(';') {
                let kv = part.trim();
                if let Some(rest) = kv.strip_prefix("auth_token=") {
                    token_val = Some(rest.to_string());
                    break;
                }
            }

            match token_val {
                Some(t) if !t.is_empty() => t,
                _ => {
                    tracing::warn!(path = %path, "missing Authorization header and auth_token cookie");
                    return Err(StatusCode::BAD_REQUEST);
                }
            }
        }
    };

    let key = DecodingKey::from_secret(state.auth.jwt_secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    match decode::<Claims>(&token, &key, &validation) {
        Ok(data) => {
            let ctx = claims_to_context(&data.claims).ok_or(StatusCode::UNAUTHORIZED)?;
            req.extensions_mut().insert(ctx);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(path = %path, err = %e, "token validation failed");
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}

fn claims_to_context(claims: &Claims) -> Option<AuthContext> {
    let user_id = claims.uid.as_deref().and_then(|v| Uuid::parse_str(v).ok())?;
    let role = claims.role.as_deref().and_then(Role::parse)?;
    Some(AuthContext { user_id, role })
}
