use sea_orm_migration::prelude::*;

use super::{
  m20260301_000001_create_users::Users, m20260301_000002_create_plans::Plans,
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Licenses::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Licenses::Key).string().not_null().primary_key(),
          )
          .col(ColumnDef::new(Licenses::UserId).big_integer().not_null())
          .col(ColumnDef::new(Licenses::Game).string().not_null())
          .col(ColumnDef::new(Licenses::PlanId).integer().null())
          .col(ColumnDef::new(Licenses::RoundsTotal).integer().not_null())
          .col(ColumnDef::new(Licenses::RoundsRemaining).integer().not_null())
          .col(
            ColumnDef::new(Licenses::PaymentVerified)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Licenses::IsActive)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Licenses::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Licenses::ActivatedAt).date_time().null())
          .check(Expr::col(Licenses::RoundsRemaining).gte(0))
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_user")
              .from(Licenses::Table, Licenses::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_licenses_plan")
              .from(Licenses::Table, Licenses::PlanId)
              .to(Plans::Table, Plans::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_licenses_user_game")
          .table(Licenses::Table)
          .col(Licenses::UserId)
          .col(Licenses::Game)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Licenses::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Licenses {
  Table,
  Key,
  UserId,
  Game,
  PlanId,
  RoundsTotal,
  RoundsRemaining,
  PaymentVerified,
  IsActive,
  CreatedAt,
  ActivatedAt,
}
