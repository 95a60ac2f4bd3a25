//! Create `user` table with FK to `school`.
//!
//! Stores account profile, the embedded tuition entitlement document and its
//! version counter (optimistic concurrency guard), per-user custom field
//! values, and password-reset state. Includes soft-delete timestamp.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(User::Table)
                    .if_not_exists()
                    .col(uuid(User::Id).primary_key())
                    .col(uuid_null(User::SchoolId))
                    .col(string_len(User::Email, 255).unique_key().not_null())
                    .col(string_len(User::FirstName, 128))
                    .col(string_len(User::LastName, 128))
                    .col(string_null(User::Username))
                    .col(string_len(User::Role, 32))
                    .col(string_null(User::Bio))
                    .col(
                        ColumnDef::new(User::Picture)
                            .string()
                            .not_null()
                            .default("no-user.jpg"),
                    )
                    .col(json_binary_null(User::Entitlement))
                    .col(integer(User::EntitlementVersion).default(0))
                    .col(json_binary_null(User::CustomValues))
                    .col(string_null(User::ResetPasswordToken))
                    .col(timestamp_with_time_zone_null(User::ResetPasswordExpire))
                    .col(timestamp_with_time_zone(User::CreatedAt))
                    .col(timestamp_with_time_zone(User::UpdatedAt))
                    // Explicitly define nullable deleted_at to avoid conflicting NULL/NOT NULL
                    .col(
                        ColumnDef::new(User::DeletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_user_school")
                            .from(User::Table, User::SchoolId)
                            .to(School::Table, School::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(User::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum User {
    Table,
    Id,
    SchoolId,
    Email,
    FirstName,
    LastName,
    Username,
    Role,
    Bio,
    Picture,
    Entitlement,
    EntitlementVersion,
    CustomValues,
    ResetPasswordToken,
    ResetPasswordExpire,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

#[derive(DeriveIden)]
enum School { Table, Id }
