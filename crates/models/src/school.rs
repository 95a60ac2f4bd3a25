use sea_orm::{entity::prelude::*, DatabaseConnection, FromJsonQueryResult, Set};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::FeeLines;
use crate::errors;
use crate::text::slugify;

/// JSON column wrapper: names of custom student columns this school has
/// imported. Tracked as data so imports never mutate any shared schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct CustomFields(pub Vec<String>);

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "school")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub slug: Option<String>,
    pub logo: String,
    pub tag: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub color: Option<String>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub custom_fields: Option<CustomFields>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub fee_lines: Option<FeeLines>,
    pub fee_deadline: Option<DateTimeWithTimeZone>,
    pub installment: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef { panic!("no relations defined here") }
}

impl ActiveModelBehavior for ActiveModel {}

pub fn validate_name(name: &str) -> Result<(), errors::ModelError> {
    if name.trim().is_empty() {
        return Err(errors::ModelError::Validation("school name required".into()));
    }
    Ok(())
}

pub async fn create(
    db: &DatabaseConnection,
    name: &str,
    created_by: Option<Uuid>,
) -> Result<Model, errors::ModelError> {
    validate_name(name)?;
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        slug: Set(Some(slugify(name))),
        logo: Set("no-logo.jpg".to_string()),
        tag: Set(None),
        bio: Set(None),
        address: Set(None),
        color: Set(None),
        custom_fields: Set(None),
        fee_lines: Set(None),
        fee_deadline: Set(None),
        installment: Set(false),
        created_by: Set(created_by),
        created_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

pub async fn hard_delete(db: &DatabaseConnection, id: Uuid) -> Result<(), errors::ModelError> {
    Entity::delete_by_id(id)
        .exec(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))?;
    Ok(())
}
