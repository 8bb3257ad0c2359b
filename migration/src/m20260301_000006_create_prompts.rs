use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Prompts::Table)
          .if_not_exists()
          .col(ColumnDef::new(Prompts::Key).string().not_null().primary_key())
          .col(ColumnDef::new(Prompts::Template).text().not_null())
          .col(ColumnDef::new(Prompts::Model).string().null())
          .col(ColumnDef::new(Prompts::UpdatedAt).date_time().not_null())
          .col(ColumnDef::new(Prompts::UpdatedBy).big_integer().null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Prompts::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Prompts {
  Table,
  Key,
  Template,
  Model,
  UpdatedAt,
  UpdatedBy,
}
