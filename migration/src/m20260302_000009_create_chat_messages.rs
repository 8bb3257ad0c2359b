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
          .table(ChatMessages::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(ChatMessages::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(ChatMessages::UserId).big_integer().not_null())
          .col(ColumnDef::new(ChatMessages::Sender).string().not_null())
          .col(ColumnDef::new(ChatMessages::Content).text().not_null())
          .col(ColumnDef::new(ChatMessages::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_chat_messages_user")
              .from(ChatMessages::Table, ChatMessages::UserId)
              .to(Users::Table, Users::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_chat_messages_user")
          .table(ChatMessages::Table)
          .col(ChatMessages::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .drop_table(Table::drop().table(ChatMessages::Table).to_owned())
      .await
  }
}

#[derive(DeriveIden)]
pub enum ChatMessages {
  Table,
  Id,
  UserId,
  Sender,
  Content,
  CreatedAt,
}
