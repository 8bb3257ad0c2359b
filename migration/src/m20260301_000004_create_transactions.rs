use sea_orm_migration::prelude::*;

use super::{
  m20260301_000001_create_users::Users,
  m20260301_000003_create_licenses::Licenses,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Transactions::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Transactions::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Transactions::UserId).big_integer().not_null())
          .col(ColumnDef::new(Transactions::Amount).big_integer().not_null())
          .col(ColumnDef::new(Transactions::TxType).string().not_null())
          .col(
            ColumnDef::new(Transactions::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Transactions::Method).string().null())
          .col(ColumnDef::new(Transactions::Reference).string().null())
          .col(ColumnDef::new(Transactions::LicenseKey).string().null())
          .col(ColumnDef::new(Transactions::Description).string().null())
          .col(ColumnDef::new(Transactions::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Transactions::ProcessedAt).date_time().null())
          .col(ColumnDef::new(Transactions::ProcessedBy).big_integer().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_transactions_user")
              .from(Transactions::Table, Transactions::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_transactions_license")
              .from(Transactions::Table, Transactions::LicenseKey)
              .to(Licenses::Table, Licenses::Key)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_transactions_user")
          .table(Transactions::Table)
          .col(Transactions::UserId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_transactions_status")
          .table(Transactions::Table)
          .col(Transactions::Status)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Transactions::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum Transactions {
  Table,
  Id,
  UserId,
  Amount,
  TxType,
  Status,
  Method,
  Reference,
  LicenseKey,
  Description,
  CreatedAt,
  ProcessedAt,
  ProcessedBy,
}
