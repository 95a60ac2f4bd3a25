//! Create `school` table.
//!
//! Holds school profile, branding fields, the fee structure used to price
//! tuition, and the per-school list of recognized custom student fields.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(School::Table)
                    .if_not_exists()
                    .col(uuid(School::Id).primary_key())
                    .col(string_len(School::Name, 160))
                    .col(string_null(School::Slug))
                    .col(
                        ColumnDef::new(School::Logo)
                            .string()
                            .not_null()
                            .default("no-logo.jpg"),
                    )
                    .col(string_null(School::Tag))
                    .col(string_null(School::Bio))
                    .col(string_null(School::Address))
                    .col(string_null(School::Color))
                    .col(json_binary_null(School::CustomFields))
                    .col(json_binary_null(School::FeeLines))
                    .col(timestamp_with_time_zone_null(School::FeeDeadline))
                    .col(boolean(School::Installment).default(false))
                    // creator FK omitted: user table references school, keep the graph acyclic
                    .col(uuid_null(School::CreatedBy))
                    .col(timestamp_with_time_zone(School::CreatedAt))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(School::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum School {
    Table,
    Id,
    Name,
    Slug,
    Logo,
    Tag,
    Bio,
    Address,
    Color,
    CustomFields,
    FeeLines,
    FeeDeadline,
    Installment,
    CreatedBy,
    CreatedAt,
}
