use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{broadcast, user};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub user_id: i64,
  pub broadcast_id: Option<i32>,
  pub title: String,
  #[sea_orm(column_type = "Text")]
  pub body: String,
  pub is_read: bool,
  pub created_at: DateTime,
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
    belongs_to = "broadcast::Entity",
    from = "Column::BroadcastId",
    to = "broadcast::Column::Id"
  )]
  Broadcast,
}

impl Related<user::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::User.def()
  }
}

impl Related<broadcast::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Broadcast.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
