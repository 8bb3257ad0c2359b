pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users;
mod m20260301_000002_create_plans;
mod m20260301_000003_create_licenses;
mod m20260301_000004_create_transactions;
mod m20260301_000005_create_predictions;
mod m20260301_000006_create_prompts;
mod m20260302_000007_create_audit_logs;
mod m20260302_000008_create_broadcasts;
mod m20260302_000009_create_chat_messages;
mod m20260305_000010_seed_default_plans;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260301_000001_create_users::Migration),
      Box::new(m20260301_000002_create_plans::Migration),
      Box::new(m20260301_000003_create_licenses::Migration),
      Box::new(m20260301_000004_create_transactions::Migration),
      Box::new(m20260301_000005_create_predictions::Migration),
      Box::new(m20260301_000006_create_prompts::Migration),
      Box::new(m20260302_000007_create_audit_logs::Migration),
      Box::new(m20260302_000008_create_broadcasts::Migration),
      Box::new(m20260302_000009_create_chat_messages::Migration),
      Box::new(m20260305_000010_seed_default_plans::Migration),
    ]
  }
}
