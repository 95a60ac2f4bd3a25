use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Users: index on school_id for roster queries
        manager
            .create_index(
                Index::create()
                    .name("idx_user_school")
                    .table(User::Table)
                    .col(User::SchoolId)
                    .to_owned(),
            )
            .await?;

        // Credentials: one row per user
        manager
            .create_index(
                Index::create()
                    .name("uniq_user_credentials_user")
                    .table(UserCredentials::Table)
                    .col(UserCredentials::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // PaymentRecord: payer and kind lookups during reconciliation
        manager
            .create_index(
                Index::create()
                    .name("idx_payment_record_payer")
                    .table(PaymentRecord::Table)
                    .col(PaymentRecord::PayerEmail)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_payment_record_kind")
                    .table(PaymentRecord::Table)
                    .col(PaymentRecord::Kind)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_user_school").table(User::Table).to_owned())
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("uniq_user_credentials_user")
                    .table(UserCredentials::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_payment_record_payer")
                    .table(PaymentRecord::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_payment_record_kind")
                    .table(PaymentRecord::Table)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum User { Table, SchoolId }

#[derive(DeriveIden)]
enum UserCredentials { Table, UserId }

#[derive(DeriveIden)]
enum PaymentRecord { Table, Kind, PayerEmail }
