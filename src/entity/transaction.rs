use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::user;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
  #[sea_orm(string_value = "deposit")]
  #[default]
  Deposit,
  #[sea_orm(string_value = "purchase")]
  Purchase,
  #[sea_orm(string_value = "commission")]
  Commission,
  #[sea_orm(string_value = "withdrawal")]
  Withdrawal,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "verified")]
  Verified,
  #[sea_orm(string_value = "failed")]
  Failed,
}

impl TransactionStatus {
  /// Statuses only move forward: pending settles exactly once.
  pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
    matches!(
      (self, next),
      (TransactionStatus::Pending, TransactionStatus::Verified)
        | (TransactionStatus::Pending, TransactionStatus::Failed)
    )
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: i64,
  pub amount: i64,
  pub tx_type: TransactionType,
  pub status: TransactionStatus,
  pub method: Option<String>,
  pub reference: Option<String>,
  pub license_key: Option<String>,
  pub description: Option<String>,
  pub created_at: DateTime,
  pub processed_at: Option<DateTime>,
  pub processed_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_moves_forward_only() {
    use TransactionStatus::*;

    assert!(Pending.can_transition_to(Verified));
    assert!(Pending.can_transition_to(Failed));
    assert!(!Verified.can_transition_to(Pending));
    assert!(!Verified.can_transition_to(Failed));
    assert!(!Failed.can_transition_to(Verified));
    assert!(!Pending.can_transition_to(Pending));
  }
}
