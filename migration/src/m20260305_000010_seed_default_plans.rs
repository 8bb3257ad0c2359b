use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    let db = manager.get_connection();

    for game in ["aviator", "mines", "dice", "roulette"] {
      db.execute_unprepared(&format!(
        "INSERT INTO plans (game, name, rounds, price, is_active, created_at, updated_at) VALUES \
        ('{game}', 'Starter', 10, 500, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP), \
        ('{game}', 'Pro', 50, 2000, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP), \
        ('{game}', 'Elite', 200, 6500, 1, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)"
      ))
      .await?;
    }

    Ok(())
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    let db = manager.get_connection();

    db.execute_unprepared(
      "DELETE FROM plans WHERE name IN ('Starter', 'Pro', 'Elite')",
    )
    .await?;

    Ok(())
  }
}
