use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use common::pagination::Pagination;
use models::entitlement::{FeeLine, FeeLines};
use models::user::Role;
use service::import;
use service::school_service::{self, UpdateSchool};

use crate::errors::ApiError;
use crate::routes::auth::{validate_image_upload, AuthContext, ServerState};

#[derive(Debug, Deserialize)]
pub struct ListSchoolsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

async fn load_school_checked(
    state: &ServerState,
    ctx: &AuthContext,
    id: Uuid,
) -> Result<models::school::Model, ApiError> {
    let school = school_service::get_school(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("school not found with id of {id}")))?;
    if school.created_by != Some(ctx.user_id) && ctx.role != Role::Admin {
        return Err(ApiError::forbidden("not authorized for this school"));
    }
    Ok(school)
}

pub async fn list(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Query(query): Query<ListSchoolsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_admin()?;
    let pagination = Pagination {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    };
    let schools = school_service::list_schools_paginated(&state.db, pagination).await?;
    Ok(Json(serde_json::json!({ "success": true, "count": schools.len(), "data": schools })))
}

pub async fn get_one(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let school = load_school_checked(&state, &ctx, id).await?;
    let students = school_service::list_students(&state.db, id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": { "school": school, "students": students } })))
}

#[derive(Debug, Deserialize)]
pub struct FeeLineRequest {
    pub name: String,
    pub amount: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SchoolBodyRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub fee_lines: Option<Vec<FeeLineRequest>>,
    #[serde(default)]
    pub fee_deadline: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub installment: Option<bool>,
}

impl SchoolBodyRequest {
    fn into_update(self) -> UpdateSchool {
        UpdateSchool {
            name: self.name,
            tag: self.tag,
            bio: self.bio,
            address: self.address,
            color: self.color,
            fee_lines: self.fee_lines.map(|lines| {
                FeeLines(
                    lines
                        .into_iter()
                        .map(|l| FeeLine { name: l.name, amount: l.amount })
                        .collect(),
                )
            }),
            fee_deadline: self.fee_deadline,
            installment: self.installment,
            logo: None,
        }
    }
}

#[utoipa::path(post, path = "/schools", tag = "schools", request_body = crate::openapi::CreateSchoolRequest, responses((status = 201, description = "Created"), (status = 400, description = "Bad Request")))]
pub async fn create(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Json(input): Json<SchoolBodyRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let name = input
        .name
        .clone()
        .ok_or_else(|| ApiError::bad_request("please add a school name"))?;
    let created = school_service::create_school(&state.db, &name, ctx.user_id).await?;

    let mut update = input.into_update();
    update.name = None; // already set at creation
    let school = school_service::update_school(&state.db, created.id, update).await?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "success": true, "data": school }))))
}

pub async fn update(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(input): Json<SchoolBodyRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_school_checked(&state, &ctx, id).await?;
    let school = school_service::update_school(&state.db, id, input.into_update()).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": school })))
}

pub async fn delete(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.require_admin()?;
    school_service::get_school(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("school not found with id of {id}")))?;
    school_service::delete_school(&state.db, id).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": {} })))
}

#[utoipa::path(post, path = "/schools/{id}/students", tag = "schools", responses((status = 200, description = "Roster imported"), (status = 400, description = "Bad Request")))]
pub async fn upload_students(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_school_checked(&state, &ctx, id).await?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.contains("csv") {
        return Err(ApiError::bad_request("please upload a csv file"));
    }

    let outcome = import::import_students(&state.db, id, &body).await?;
    Ok(Json(serde_json::json!({ "success": true, "data": outcome })))
}

pub async fn upload_logo(
    State(state): State<ServerState>,
    Extension(ctx): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_school_checked(&state, &ctx, id).await?;

    let content_type = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let ext = validate_image_upload(content_type, body.len(), state.uploads.max_file_bytes)?;

    let filename = format!("{id}-logo.{ext}");
    let path = state
        .storage
        .put("logo", &filename, content_type.unwrap_or("image/unknown"), &body)
        .await?;

    let school = school_service::update_school(
        &state.db,
        id,
        UpdateSchool { logo: Some(path), ..Default::default() },
    )
    .await?;
    Ok(Json(serde_json::json!({ "success": true, "data": school.logo })))
}
