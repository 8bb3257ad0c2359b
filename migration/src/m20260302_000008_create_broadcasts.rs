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
          .table(Broadcasts::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Broadcasts::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Broadcasts::Author).string().not_null())
          .col(ColumnDef::new(Broadcasts::Title).string().not_null())
          .col(ColumnDef::new(Broadcasts::Body).text().not_null())
          .col(ColumnDef::new(Broadcasts::Audience).json().not_null())
          .col(
            ColumnDef::new(Broadcasts::Recipients)
              .integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Broadcasts::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_table(
        Table::create()
          .table(Notifications::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Notifications::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Notifications::UserId).big_integer().not_null())
          .col(ColumnDef::new(Notifications::BroadcastId).integer().null())
          .col(ColumnDef::new(Notifications::Title).string().not_null())
          .col(ColumnDef::new(Notifications::Body).text().not_null())
          .col(
            ColumnDef::new(Notifications::IsRead)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(ColumnDef::new(Notifications::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_notifications_user")
              .from(Notifications::Table, Notifications::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .foreign_key(
            ForeignKey::create()
              .name("fk_notifications_broadcast")
              .from(Notifications::Table, Notifications::BroadcastId)
              .to(Broadcasts::Table, Broadcasts::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_notifications_user")
          .table(Notifications::Table)
          .col(Notifications::UserId)
          .col(Notifications::IsRead)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(Notifications::Table).to_owned())
      .await?;

    manager.drop_table(Table::drop().table(Broadcasts::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Broadcasts {
  Table,
  Id,
  Author,
  Title,
  Body,
  Audience,
  Recipients,
  CreatedAt,
}

#[derive(DeriveIden)]
pub enum Notifications {
  Table,
  Id,
  UserId,
  BroadcastId,
  Title,
  Body,
  IsRead,
  CreatedAt,
}
