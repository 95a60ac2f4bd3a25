//! Append-only log of payment attempts and reconciliation markers.
//!
//! `reference` holds the checkout reference for `full`/`installment` rows and
//! the gateway event id for `reconciliation_marker` rows; the unique index on
//! it makes marker insertion the idempotency boundary for webhook delivery.

use sea_orm::sea_query::StringLen;
use sea_orm::{entity::prelude::*, DatabaseConnection, QueryFilter, Set};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entitlement::FeeLines;
use crate::errors;

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[sea_orm(string_value = "full")]
    Full,
    #[sea_orm(string_value = "installment")]
    Installment,
    #[sea_orm(string_value = "reconciliation_marker")]
    ReconciliationMarker,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_record")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub reference: String,
    pub kind: RecordKind,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub fee_lines: Option<FeeLines>,
    pub payer_email: Option<String>,
    pub term: Option<i32>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef { panic!("no relations defined here") }
}

impl ActiveModelBehavior for ActiveModel {}

/// Record a payment attempt at initiation time.
pub async fn create_attempt(
    db: &DatabaseConnection,
    reference: &str,
    kind: RecordKind,
    fee_lines: FeeLines,
    payer_email: &str,
    term: i32,
) -> Result<Model, errors::ModelError> {
    if reference.trim().is_empty() {
        return Err(errors::ModelError::Validation("reference required".into()));
    }
    if kind == RecordKind::ReconciliationMarker {
        return Err(errors::ModelError::Validation(
            "attempts cannot use the marker kind".into(),
        ));
    }
    if !(1..=3).contains(&term) {
        return Err(errors::ModelError::Validation("term must be in 1..=3".into()));
    }
    let am = ActiveModel {
        id: Set(Uuid::new_v4()),
        reference: Set(reference.to_string()),
        kind: Set(kind),
        fee_lines: Set(Some(fee_lines)),
        payer_email: Set(Some(crate::user::normalize_email(payer_email))),
        term: Set(Some(term)),
        created_at: Set(Utc::now().into()),
    };
    am.insert(db).await.map_err(|e| errors::ModelError::Db(e.to_string()))
}

/// ActiveModel for a reconciliation marker, ready to insert on a connection
/// or inside a transaction.
pub fn marker_active_model(event_id: &str) -> ActiveModel {
    ActiveModel {
        id: Set(Uuid::new_v4()),
        reference: Set(event_id.to_string()),
        kind: Set(RecordKind::ReconciliationMarker),
        fee_lines: Set(None),
        payer_email: Set(None),
        term: Set(None),
        created_at: Set(Utc::now().into()),
    }
}

pub async fn find_by_reference(
    db: &DatabaseConnection,
    reference: &str,
) -> Result<Option<Model>, errors::ModelError> {
    Entity::find()
        .filter(Column::Reference.eq(reference))
        .one(db)
        .await
        .map_err(|e| errors::ModelError::Db(e.to_string()))
}
