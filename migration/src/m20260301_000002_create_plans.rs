use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Plans::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Plans::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Plans::Game).string().not_null())
          .col(ColumnDef::new(Plans::Name).string().not_null())
          .col(ColumnDef::new(Plans::Rounds).integer().not_null())
          .col(ColumnDef::new(Plans::Price).big_integer().not_null())
          .col(
            ColumnDef::new(Plans::IsActive)
              .boolean()
              .not_null()
              .default(true),
          )
          .col(ColumnDef::new(Plans::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Plans::UpdatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_plans_game")
          .table(Plans::Table)
          .col(Plans::Game)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Plans::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Plans {
  Table,
  Id,
  Game,
  Name,
  Rounds,
  Price,
  IsActive,
  CreatedAt,
  UpdatedAt,
}
