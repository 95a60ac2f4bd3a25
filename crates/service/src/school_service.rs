use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use common::pagination::Pagination;
use models::entitlement::FeeLines;
use models::school::{self, CustomFields};
use models::text::slugify;

use crate::errors::ServiceError;

/// Fields a school owner may change; `None` leaves a field untouched.
#[derive(Debug, Default, Clone)]
pub struct UpdateSchool {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub color: Option<String>,
    pub fee_lines: Option<FeeLines>,
    pub fee_deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub installment: Option<bool>,
    pub logo: Option<String>,
}

/// Create a school owned by `created_by`.
pub async fn create_school(
    db: &DatabaseConnection,
    name: &str,
    created_by: Uuid,
) -> Result<school::Model, ServiceError> {
    let created = school::create(db, name, Some(created_by)).await?;
    Ok(created)
}

/// Get a school by id.
pub async fn get_school(
    db: &DatabaseConnection,
    id: Uuid,
) -> Result<Option<school::Model>, ServiceError> {
    school::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Apply profile/fee updates.
pub async fn update_school(
    db: &DatabaseConnection,
    id: Uuid,
    update: UpdateSchool,
) -> Result<school::Model, ServiceError> {
    let mut am: school::ActiveModel = school::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("school"))?
        .into();

    if let Some(name) = update.name {
        school::validate_name(&name)?;
        am.slug = Set(Some(slugify(&name)));
        am.name = Set(name);
    }
    if let Some(tag) = update.tag {
        am.tag = Set(Some(tag));
    }
    if let Some(bio) = update.bio {
        am.bio = Set(Some(bio));
    }
    if let Some(address) = update.address {
        am.address = Set(Some(address));
    }
    if let Some(color) = update.color {
        am.color = Set(Some(color));
    }
    if let Some(fee_lines) = update.fee_lines {
        if fee_lines.0.iter().any(|l| l.amount < 0) {
            return Err(ServiceError::Validation("fee amounts must be non-negative".into()));
        }
        am.fee_lines = Set(Some(fee_lines));
    }
    if let Some(deadline) = update.fee_deadline {
        am.fee_deadline = Set(Some(deadline.into()));
    }
    if let Some(installment) = update.installment {
        am.installment = Set(installment);
    }
    if let Some(logo) = update.logo {
        am.logo = Set(logo);
    }

    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// Hard delete a school.
pub async fn delete_school(db: &DatabaseConnection, id: Uuid) -> Result<(), ServiceError> {
    school::hard_delete(db, id).await?;
    Ok(())
}

/// List schools with pagination, newest first.
pub async fn list_schools_paginated(
    db: &DatabaseConnection,
    opts: Pagination,
) -> Result<Vec<school::Model>, ServiceError> {
    use sea_orm::PaginatorTrait;
    let (page_idx, per_page) = opts.normalize();
    school::Entity::find()
        .order_by_desc(school::Column::CreatedAt)
        .paginate(db, per_page)
        .fetch_page(page_idx)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

/// Merge newly-seen custom column names into the school's recognized set,
/// returning the updated model. Known names are kept in first-seen order.
pub async fn register_custom_fields(
    db: &DatabaseConnection,
    id: Uuid,
    new_fields: &[String],
) -> Result<school::Model, ServiceError> {
    let found = school::Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))?
        .ok_or_else(|| ServiceError::not_found("school"))?;

    let mut fields = found.custom_fields.clone().unwrap_or_default().0;
    let mut changed = false;
    for field in new_fields {
        if !fields.iter().any(|f| f == field) {
            fields.push(field.clone());
            changed = true;
        }
    }
    if !changed {
        return Ok(found);
    }

    let mut am: school::ActiveModel = found.into();
    am.custom_fields = Set(Some(CustomFields(fields)));
    am.update(db).await.map_err(|e| ServiceError::Db(e.to_string()))
}

/// List the students of a school.
pub async fn list_students(
    db: &DatabaseConnection,
    school_id: Uuid,
) -> Result<Vec<models::user::Model>, ServiceError> {
    models::user::Entity::find()
        .filter(models::user::Column::SchoolId.eq(school_id))
        .filter(models::user::Column::Role.eq(models::user::Role::Student))
        .filter(models::user::Column::DeletedAt.is_null())
        .all(db)
        .await
        .map_err(|e| ServiceError::Db(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;

    #[tokio::test]
    async fn school_crud_service() -> Result<(), anyhow::Error> {
        if std::env::var("DATABASE_URL").is_err() { return Ok(()); }
        let db = models::db::connect().await?;
        migration::Migrator::up(&db, None).await?;

        let owner = Uuid::new_v4();
        let name = format!("svc_school_{}", Uuid::new_v4());
        let s = create_school(&db, &name, owner).await?;
        assert_eq!(s.created_by, Some(owner));

        let updated = update_school(
            &db,
            s.id,
            UpdateSchool { bio: Some("bio".into()), installment: Some(true), ..Default::default() },
        )
        .await?;
        assert_eq!(updated.bio.as_deref(), Some("bio"));
        assert!(updated.installment);

        let with_fields =
            register_custom_fields(&db, s.id, &["gender".into(), "class".into()]).await?;
        assert_eq!(with_fields.custom_fields.unwrap().0, vec!["gender", "class"]);
        // registering the same names again is a no-op
        let again = register_custom_fields(&db, s.id, &["class".into()]).await?;
        assert_eq!(again.custom_fields.unwrap().0, vec!["gender", "class"]);

        delete_school(&db, s.id).await?;
        assert!(get_school(&db, s.id).await?.is_none());
        Ok(())
    }
}
