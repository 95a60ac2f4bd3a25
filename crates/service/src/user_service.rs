use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use common::pagination::Pagination;
use models::user::{self, Role};

use crate::errors::ServiceError;

/// Optional filters for user listings.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub school_id: Option<Uuid>,
}

/// Fields an update may touch; `None` leaves a field untouched.
#[derive(Debug, Default, Clone)]
pub struct UpdateUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub picture: Option<String>,
    pub school_id: Option<Uuid>,
    pub role: Option<Role>,
}

/// Create a new user.
pub async fn create_user(
    db: &DatabaseConnection,
    new: user::NewUser<'_>,
) -> Result<user::Model, ServiceError> {
    let created = user::create(db, new).await?;
    Ok(created)
}

/// Get a user by id (soft-deleted users excluded).
pub async fn get_user(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<user::Model>, ServiceError> {
    user::Entity::find_by_id(id)
        .filter(user::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Apply profile updates.
pub async fn update_user(
    db: &DatabaseConnection,
    id: Uuid,
    update: UpdateUser,
) -> Result<user::Model, ServiceError> {
    let mut am: user::ActiveModel = user::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("user"))?
        .into();

    if let Some(first_name) = update.first_name {
        user::validate_name(&first_name)?;
        am.first_name = Set(first_name);
    }
    if let Some(last_name) = update.last_name {
        user::validate_name(&last_name)?;
        am.last_name = Set(last_name);
    }
    if let Some(bio) = update.bio {
        am.bio = Set(Some(bio));
    }
    if let Some(picture) = update.picture {
        am.picture = Set(picture);
    }
    if let Some(school_id) = update.school_id {
        am.school_id = Set(Some(school_id));
    }
    if let Some(role) = update.role {
        am.role = Set(role);
    }
    am.updated_at = Set(Utc::now().into());

    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Soft-delete a user (marks deleted_at).
pub async fn soft_delete_user(db: &DatabaseConnection, id: Uuid) -> Result<(), ServiceError> {
    user::soft_delete(db, id).await?;
    Ok(())
}

/// Hard-delete a user (removes record).
pub async fn hard_delete_user(db: &DatabaseConnection, id: Uuid) -> Result<(), ServiceError> {
    user::hard_delete(db, id).await?;
    Ok(())
}

/// List users with optional role/school filters and pagination.
pub async fn list_users_paginated(
    db: &DatabaseConnection,
    filter: UserFilter,
    opts: Pagination,
) -> Result<Vec<user::Model>, ServiceError> {
    use sea_orm::PaginatorTrait;
    let (page_idx, per_page) = opts.normalize();
    let mut query = user::Entity::find()
        .filter(user::Column::DeletedAt.is_null())
        .order_by_desc(user::Column::CreatedAt);
    if let Some(role) = filter.role {
        query = query.filter(user::Column::Role.eq(role));
    }
    if let Some(school_id) = filter.school_id {
        query = query.filter(user::Column::SchoolId.eq(school_id));
    }
    query
        .paginate(db, per_page)
        .fetch_page(page_idx)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}
