//! Shared test utilities for database setup

#[cfg(test)]
pub mod test_db {
  use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection,
    DbBackend, NotSet, Schema, Set,
  };

  use crate::{
    entity::*,
    utils::{self, referral_code},
  };

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    // Parents before children so foreign keys resolve
    let stmts = [
      schema.create_table_from_entity(user::Entity),
      schema.create_table_from_entity(plan::Entity),
      schema.create_table_from_entity(license::Entity),
      schema.create_table_from_entity(transaction::Entity),
      schema.create_table_from_entity(prediction::Entity),
      schema.create_table_from_entity(prompt::Entity),
      schema.create_table_from_entity(audit_log::Entity),
      schema.create_table_from_entity(broadcast::Entity),
      schema.create_table_from_entity(notification::Entity),
      schema.create_table_from_entity(chat_message::Entity),
    ];

    for stmt in stmts {
      db.execute(db.get_database_backend().build(&stmt)).await.unwrap();
    }

    db
  }

  /// Inserts a user directly, bypassing registration and password hashing
  pub async fn user(
    db: &DatabaseConnection,
    email: &str,
    role: UserRole,
    balance: i64,
  ) -> user::Model {
    user::ActiveModel {
      id: NotSet,
      email: Set(email.to_string()),
      display_name: Set(email.split('@').next().unwrap_or(email).to_string()),
      password_hash: Set("x".into()),
      role: Set(role),
      is_suspended: Set(false),
      balance: Set(balance),
      referral_code: Set(referral_code()),
      referred_by: Set(None),
      commission_rate: Set(10),
      referral_sales: Set(0),
      referral_earnings: Set(0),
      created_at: Set(utils::now()),
      last_login_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap()
  }

  pub async fn referred_user(
    db: &DatabaseConnection,
    email: &str,
    referrer: &user::Model,
  ) -> user::Model {
    let user = user(db, email, UserRole::User, 0).await;
    user::ActiveModel { referred_by: Set(Some(referrer.id)), ..user.into() }
      .update(db)
      .await
      .unwrap()
  }

  pub async fn plan(
    db: &DatabaseConnection,
    game: Game,
    rounds: i32,
    price: i64,
  ) -> plan::Model {
    let now = utils::now();
    plan::ActiveModel {
      id: NotSet,
      game: Set(game),
      name: Set(format!("{game} x{rounds}")),
      rounds: Set(rounds),
      price: Set(price),
      is_active: Set(true),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
  }
}
