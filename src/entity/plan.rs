use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Game, license};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "plans")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub game: Game,
  pub name: String,
  pub rounds: i32,
  pub price: i64,
  pub is_active: bool,
  pub created_at: DateTime,
  pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "license::Entity")]
  Licenses,
}

impl Related<license::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Licenses.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
