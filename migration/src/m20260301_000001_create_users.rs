use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Users::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Users::Id)
              .big_integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Users::Email).string().not_null().unique_key())
          .col(ColumnDef::new(Users::DisplayName).string().not_null())
          .col(ColumnDef::new(Users::PasswordHash).string().not_null())
          .col(ColumnDef::new(Users::Role).string().not_null().default("user"))
          .col(
            ColumnDef::new(Users::IsSuspended)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Users::Balance)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Users::ReferralCode)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(ColumnDef::new(Users::ReferredBy).big_integer().null())
          .col(
            ColumnDef::new(Users::CommissionRate)
              .integer()
              .not_null()
              .default(10),
          )
          .col(
            ColumnDef::new(Users::ReferralSales)
              .integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Users::ReferralEarnings)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Users::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Users::LastLoginAt).date_time().null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_users_referred_by")
          .table(Users::Table)
          .col(Users::ReferredBy)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Users::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Users {
  Table,
  Id,
  Email,
  DisplayName,
  PasswordHash,
  Role,
  IsSuspended,
  Balance,
  ReferralCode,
  ReferredBy,
  CommissionRate,
  ReferralSales,
  ReferralEarnings,
  CreatedAt,
  LastLoginAt,
}
