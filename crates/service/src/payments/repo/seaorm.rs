use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr, TransactionTrait,
};
use chrono::Utc;
use uuid::Uuid;

use models::entitlement::Entitlement;
use models::payment_record::{self, RecordKind};
use models::user;

use crate::payments::errors::PaymentError;
use crate::payments::store::{CommitOutcome, PaymentAttempt, Payer, RecordStore};

pub struct SeaOrmRecordStore {
    pub db: DatabaseConnection,
}

fn db_err(e: DbErr) -> PaymentError {
    PaymentError::Persistence(e.to_string())
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
        || e.to_string().contains("duplicate key value violates unique constraint")
}

#[async_trait]
impl RecordStore for SeaOrmRecordStore {
    async fn marker_exists(&self, event_id: &str) -> Result<bool, PaymentError> {
        let found = payment_record::Entity::find()
            .filter(payment_record::Column::Reference.eq(event_id))
            .filter(payment_record::Column::Kind.eq(RecordKind::ReconciliationMarker))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        Ok(found.is_some())
    }

    async fn find_attempt(&self, reference: &str) -> Result<Option<PaymentAttempt>, PaymentError> {
        let found = payment_record::Entity::find()
            .filter(payment_record::Column::Reference.eq(reference))
            .filter(payment_record::Column::Kind.ne(RecordKind::ReconciliationMarker))
            .one(&self.db)
            .await
            .map_err(db_err)?;
        let Some(rec) = found else { return Ok(None) };

        let payer_email = rec.payer_email.ok_or_else(|| {
            PaymentError::InvariantViolation(format!("attempt {reference} has no payer"))
        })?;
        let term = rec.term.ok_or_else(|| {
            PaymentError::InvariantViolation(format!("attempt {reference} has no term"))
        })?;
        Ok(Some(PaymentAttempt {
            reference: rec.reference,
            payer_email,
            term,
            fee_lines: rec.fee_lines.map(|f| f.0).unwrap_or_default(),
        }))
    }

    async fn find_payer(&self, email: &str) -> Result<Option<Payer>, PaymentError> {
        let found = user::find_by_email(&self.db, email)
            .await
            .map_err(|e| PaymentError::Persistence(e.to_string()))?;
        Ok(found.map(|u| Payer {
            user_id: u.id,
            school_id: u.school_id,
            entitlement: u.entitlement,
            entitlement_version: u.entitlement_version,
        }))
    }

    async fn commit(
        &self,
        user_id: Uuid,
        expected_version: i32,
        next: &Entitlement,
        event_id: &str,
    ) -> Result<CommitOutcome, PaymentError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        // Version-guarded entitlement write; zero rows means a concurrent
        // writer got there first.
        let update = user::Entity::update_many()
            .set(user::ActiveModel {
                entitlement: Set(Some(next.clone())),
                entitlement_version: Set(expected_version + 1),
                updated_at: Set(Utc::now().into()),
                ..Default::default()
            })
            .filter(user::Column::Id.eq(user_id))
            .filter(user::Column::EntitlementVersion.eq(expected_version))
            .exec(&txn)
            .await
            .map_err(db_err)?;
        if update.rows_affected == 0 {
            txn.rollback().await.map_err(db_err)?;
            return Ok(CommitOutcome::VersionConflict);
        }

        // Marker insert rides the same transaction so the entitlement write
        // is never visible without its marker. The unique index on
        // `reference` turns a lost duplicate race into a clean rollback.
        match payment_record::marker_active_model(event_id).insert(&txn).await {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await.map_err(db_err)?;
                return Ok(CommitOutcome::DuplicateMarker);
            }
            Err(e) => {
                txn.rollback().await.map_err(db_err)?;
                return Err(db_err(e));
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(CommitOutcome::Committed)
    }
}
