use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::notification;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "broadcasts")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub author: String,
  pub title: String,
  #[sea_orm(column_type = "Text")]
  pub body: String,
  pub audience: Json,
  pub recipients: i32,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "notification::Entity")]
  Notifications,
}

impl Related<notification::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Notifications.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
