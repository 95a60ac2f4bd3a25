use argon2::{password_hash::{PasswordHasher, SaltString}, Argon2};
use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use rand::rngs::OsRng;
use serde::Deserialize;
use uuid::Uuid;

use common::pagination::Pagination;
use models::user::{self, Role};
use service::user_service::{self, UpdateUser, UserFilter};

use crate::errors::ApiError;
use crate::routes::auth::{AuthContext, ServerState};

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub school_id: Option<Uuid>,
}

pub async fn list(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_admin()?;
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let users = user_service::list_users_paginated(
        &state.db,
        UserFilter { role: query.role, school_id: query.school_id },
        pagination,
    )
    .await?;
    Ok(Json(serde_json::json!({ "success": true, "count": users.len(), "data": users })))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_self_or_admin(id)?;
    let user = user_service::get_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user not found with id of {id}")))?;
    Ok(Json(serde_json::json!({ "success": true, "data": user })))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub password: Option<String>,
}

pub async fn create(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<CreateUserRequest>,
) -> Result<(axum::http::StatusCode, Json<serde_json::Value>), ApiError> {
    ctx.require_admin()?;
    let created = user_service::create_user(
        &state.db,
        user::NewUser {
            first_name: &input.first_name,
            last_name: &input.last_name,
            email: &input.email,
            role: input.role.unwrap_or(Role::School),
            school_id: input.school_id,
        },
    )
    .await?;

    if let Some(password) = &input.password {
        if password.len() < 8 {
            return Err(ApiError::bad_request("password too short (>=8)"));
        }
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| ApiError::internal(e.to_string()))?
            .to_string();
        models::user_credentials::upsert_password(&state.db, created.id, hash, "argon2").await?;
    }

    Ok((
        axum::http::StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "data": created })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub school_id: Option<Uuid>,
    #[serde(default)]
    pub role: Option<Role>,
}

pub async fn update(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateUserRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_self_or_admin(id)?;
    // role and school reassignment stay admin-only
    if (input.role.is_some() || input.school_id.is_some()) && ctx.role != Role::Admin {
        return Err(ApiError::forbidden("only admins may change role or school"));
    }
    let updated = user_service::update_user(
        &state.db,
        id,
        UpdateUser {
            first_name: input.first_name,
            last_name: input.last_name,
            bio: input.bio,
            picture: None,
            school_id: input.school_id,
            role: input.role,
        },
    )
    .await?;
    Ok(Json(serde_json::json!({ "success": true, "data": updated })))
}

pub async fn delete(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_admin()?;
    user_service::get_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("user not found with id of {id}")))?;
    user_service::soft_delete_user(&state.db, id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": {} })))
}
