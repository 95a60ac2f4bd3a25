//! Create `payment_record` table: append-only log of payment attempts and
//! reconciliation markers.
//!
//! The unique index on `reference` is the concurrency primitive for webhook
//! idempotency: a marker row for a gateway event id can be inserted at most
//! once.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentRecord::Table)
                    .if_not_exists()
                    .col(uuid(PaymentRecord::Id).primary_key())
                    .col(string_len(PaymentRecord::Reference, 128).unique_key().not_null())
                    .col(string_len(PaymentRecord::Kind, 32))
                    .col(json_binary_null(PaymentRecord::FeeLines))
                    .col(string_null(PaymentRecord::PayerEmail))
                    .col(integer_null(PaymentRecord::Term))
                    .col(timestamp_with_time_zone(PaymentRecord::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentRecord::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum PaymentRecord {
    Table,
    Id,
    Reference,
    Kind,
    FeeLines,
    PayerEmail,
    Term,
    CreatedAt,
}
