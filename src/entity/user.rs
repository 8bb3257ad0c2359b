use std::str::FromStr;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{chat_message, license, notification, transaction};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
  #[sea_orm(string_value = "user")]
  #[default]
  User,
  #[sea_orm(string_value = "assistant")]
  Assistant,
  #[sea_orm(string_value = "admin")]
  Admin,
  #[sea_orm(string_value = "super_admin")]
  SuperAdmin,
}

impl UserRole {
  pub fn rank(&self) -> u8 {
    match self {
      UserRole::User => 0,
      UserRole::Assistant => 1,
      UserRole::Admin => 2,
      UserRole::SuperAdmin => 3,
    }
  }

  /// Assistants and above.
  pub fn is_staff(&self) -> bool {
    self.rank() >= UserRole::Assistant.rank()
  }

  pub fn is_admin(&self) -> bool {
    self.rank() >= UserRole::Admin.rank()
  }

  /// Whether `self` may move a user currently holding `current` to `new`.
  pub fn can_assign(&self, current: UserRole, new: UserRole) -> bool {
    match self {
      UserRole::SuperAdmin => true,
      UserRole::Admin => {
        current.rank() < self.rank() && new.rank() < self.rank()
      }
      _ => false,
    }
  }
}

impl FromStr for UserRole {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "user" => Ok(UserRole::User),
      "assistant" => Ok(UserRole::Assistant),
      "admin" => Ok(UserRole::Admin),
      "super_admin" | "superadmin" => Ok(UserRole::SuperAdmin),
      other => Err(format!("unknown role `{other}`")),
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i64,
  #[sea_orm(unique)]
  pub email: String,
  pub display_name: String,
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub role: UserRole,
  pub is_suspended: bool,
  pub balance: i64,
  #[sea_orm(unique)]
  pub referral_code: String,
  pub referred_by: Option<i64>,
  pub commission_rate: i32,
  pub referral_sales: i32,
  pub referral_earnings: i64,
  pub created_at: DateTime,
  pub last_login_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "license::Entity")]
  Licenses,
  #[sea_orm(has_many = "transaction::Entity")]
  Transactions,
  #[sea_orm(has_many = "notification::Entity")]
  Notifications,
  #[sea_orm(has_many = "chat_message::Entity")]
  ChatMessages,
}

impl Related<license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Licenses.def()
  }
}

impl Related<transaction::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Transactions.def()
  }
}

impl Related<notification::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Notifications.def()
  }
}

impl Related<chat_message::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::ChatMessages.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
