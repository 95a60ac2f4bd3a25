use std::collections::BTreeMap;

use sea_orm::sea_query::StringLen;
use sea_orm::{entity::prelude::*, DatabaseConnection, FromJsonQueryResult, QueryFilter, Set};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::Entitlement;
use crate::errors;
use crate::school;
use crate::text::slugify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[sea_orm(string_value = "student")]
    Student,
    #[sea_orm(string_value = "school")]
    School,
    #[sea_orm(string_value = "admin")]
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::School => "school",
            Role::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "student" => Some(Role::Student),
            "school" => Some(Role::School),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// JSON column wrapper: per-user values for the school's custom student
/// columns, keyed by column name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CustomValues(pub BTreeMap<String, String>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub school_id: Option<Uuid>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub username: Option<String>,
    pub role: Role,
    pub bio: Option<String>,
    pub picture: String,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub entitlement: Option<Entitlement>,
    pub entitlement_version: i32,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub custom_values: Option<CustomValues>,
    #[serde(skip_serializing)]
    pub reset_password_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_password_expire: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {
    School,
}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        match self {
            Relation::School => Entity::belongs_to(school::Entity)
                .from(Column::SchoolId)
                .to(school::Column::Id)
                .into(),
        }
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Strip whitespace and lowercase, the canonical form stored and queried.
pub fn normalize_email(email: &str) -> String {
    email.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), errors::ModelError> {
    if !email.contains('@') {
        return Err(errors::ModelError::Validation("invalid email".into()));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), errors::ModelError> {
    if name.trim().is_empty() {
        return Err(errors::ModelError::Validation("name required".into()));
    }
    Ok(())
}

pub struct NewUser<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub role: Role,
    pub school_id: Option<Uuid>,
}

pub async fn create(db: &DatabaseConnection, new: NewUser<'_>) -> Result<Model, errors::ModelError> {
    let email = normalize_email(new.email);
    validate_email(&email)?;
    validate_name(new.first_name)?;
    validate_name(new.last_name)?;
    let now = Utc::now().into();
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        school_id: Set(new.school_id),
        email: Set(email),
        first_name: Set(new.first_name.to_string()),
        last_name: Set(new.last_name.to_string()),
        username: Set(Some(slugify(&format!("{} {}", new.first_name, new.last_name)))),
        role: Set(new.role),
        bio: Set(None),
        picture: Set("no-user.jpg".to_string()),
        entitlement: Set(None),
        entitlement_version: Set(0),
        custom_values: Set(None),
        reset_password_token: Set(None),
        reset_password_expire: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

pub async fn find_by_email(
    db: &DatabaseConnection,
    email: &str,
) -> Result<Option<Model>, errors::ModelError> {
    Entity::find()
        .filter(Column::Email.eq(normalize_email(email)))
        .filter(Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))
}

pub async fn soft_delete(db: &DatabaseConnection, id: Uuid) -> Result<(), errors::ModelError> {
    let mut found: ActiveModel = Entity::find_by_id(id)
        .one(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))?
        .ok_or_else(|| errors::ModelError::Validation("user not found".into()))?
        .into();
    found.deleted_at = Set(Some(Utc::now().into()));
    found.update(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))?;
    Ok(())
}

pub async fn hard_delete(db: &DatabaseConnection, id: Uuid) -> Result<(), errors::ModelError> {
    Entity::delete_by_id(id)
        .exec(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_strips_and_lowers() {
        assert_eq!(normalize_email(" Ada.L@Example.COM \n"), "ada.l@example.com");
    }

    #[test]
    fn validate_email_requires_at() {
        assert!(validate_email("nope").is_err());
        assert!(validate_email("a@b.com").is_ok());
    }
}
