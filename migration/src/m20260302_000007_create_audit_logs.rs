use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(AuditLogs::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(AuditLogs::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(AuditLogs::ActorId).big_integer().null())
          .col(ColumnDef::new(AuditLogs::Actor).string().not_null())
          .col(ColumnDef::new(AuditLogs::Action).string().not_null())
          .col(ColumnDef::new(AuditLogs::Target).string().null())
          .col(ColumnDef::new(AuditLogs::Details).json().null())
          .col(ColumnDef::new(AuditLogs::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_audit_logs_action")
          .table(AuditLogs::Table)
          .col(AuditLogs::Action)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(AuditLogs::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum AuditLogs {
  Table,
  Id,
  ActorId,
  Actor,
  Action,
  Target,
  Details,
  CreatedAt,
}
