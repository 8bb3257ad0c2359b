use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Game, plan, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "licenses")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub key: String,
  pub user_id: i64,
  pub game: Game,
  pub plan_id: Option<i32>,
  pub rounds_total: i32,
  pub rounds_remaining: i32,
  pub payment_verified: bool,
  pub is_active: bool,
  pub created_at: DateTime,
  pub activated_at: Option<DateTime>,
}

impl Model {
  pub fn is_usable(&self) -> bool {
    self.payment_verified && self.is_active && self.rounds_remaining > 0
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "user::Entity",
    from = "Column::UserId",
    to = "user::Column::Id"
  )]
  User,
  #[sea_orm(
    belongs_to = "plan::Entity",
    from = "Column::PlanId",
    to = "plan::Column::Id"
  )]
  Plan,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<plan::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Plan.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
