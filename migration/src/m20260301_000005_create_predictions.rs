use sea_orm_migration::prelude::*;

use super::m20260301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Predictions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Predictions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Predictions::UserId).big_integer().not_null())
          .col(ColumnDef::new(Predictions::LicenseKey).string().not_null())
          .col(ColumnDef::new(Predictions::Game).string().not_null())
          .col(ColumnDef::new(Predictions::Request).json().not_null())
          .col(ColumnDef::new(Predictions::Response).json().not_null())
          .col(ColumnDef::new(Predictions::Source).string().not_null())
          .col(
            ColumnDef::new(Predictions::Feedback)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Predictions::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Predictions::FeedbackAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_predictions_user")
              .from(Predictions::Table, Predictions::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_predictions_user")
          .table(Predictions::Table)
          .col(Predictions::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Predictions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Predictions {
  Table,
  Id,
  UserId,
  LicenseKey,
  Game,
  Request,
  Response,
  Source,
  Feedback,
  CreatedAt,
  FeedbackAt,
}
