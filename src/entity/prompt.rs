use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "prompts")]
pub struct Model {
  #[sea_orm(primary_key, auto_increment = false)]
  pub key: String,
  #[sea_orm(column_type = "Text")]
  pub template: String,
  pub model: Option<String>,
  pub updated_at: DateTime,
  pub updated_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
