use serde::Deserialize;

use super::{Actor, Audit};
use crate::{
  entity::{Game, plan},
  prelude::*,
};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PlanUpdate {
  pub name: Option<String>,
  pub rounds: Option<i32>,
  pub price: Option<i64>,
  pub is_active: Option<bool>,
}

pub struct Plan<'a> {
  db: &'a DatabaseConnection,
}

fn validate(rounds: i32, price: i64) -> Result<()> {
  if rounds <= 0 {
    return Err(Error::InvalidArgs("Rounds must be positive".into()));
  }
  if price <= 0 {
    return Err(Error::InvalidArgs("Price must be positive".into()));
  }
  Ok(())
}

impl<'a> Plan<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn list(
    &self,
    game: Option<Game>,
    include_inactive: bool,
  ) -> Result<Vec<plan::Model>> {
    let mut query = plan::Entity::find();

    if let Some(game) = game {
      query = query.filter(plan::Column::Game.eq(game));
    }
    if !include_inactive {
      query = query.filter(plan::Column::IsActive.eq(true));
    }

    Ok(
      query
        .order_by_asc(plan::Column::Game)
        .order_by_asc(plan::Column::Price)
        .all(self.db)
        .await?,
    )
  }

  pub async fn by_id(&self, id: i32) -> Result<plan::Model> {
    plan::Entity::find_by_id(id).one(self.db).await?.ok_or(Error::PlanNotFound)
  }

  pub async fn create(
    &self,
    actor: Actor,
    game: Game,
    name: &str,
    rounds: i32,
    price: i64,
  ) -> Result<plan::Model> {
    actor.require_admin()?;
    validate(rounds, price)?;

    let name = name.trim();
    if name.is_empty() {
      return Err(Error::InvalidArgs("Plan name is required".into()));
    }

    let txn = self.db.begin().await?;
    let now = utils::now();

    let plan = plan::ActiveModel {
      id: NotSet,
      game: Set(game),
      name: Set(name.to_string()),
      rounds: Set(rounds),
      price: Set(price),
      is_active: Set(true),
      created_at: Set(now),
      updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    Audit::record(
      &txn,
      actor,
      "plan.create",
      Some(format!("plan:{}", plan.id)),
      Some(json::json!({ "game": game, "rounds": rounds, "price": price })),
    )
    .await?;

    txn.commit().await?;
    Ok(plan)
  }

  pub async fn update(
    &self,
    actor: Actor,
    id: i32,
    update: PlanUpdate,
  ) -> Result<plan::Model> {
    actor.require_admin()?;

    let txn = self.db.begin().await?;
    let plan = plan::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::PlanNotFound)?;

    validate(
      update.rounds.unwrap_or(plan.rounds),
      update.price.unwrap_or(plan.price),
    )?;

    let mut model: plan::ActiveModel = plan.into();
    if let Some(name) = update.name.as_deref().map(str::trim) {
      if name.is_empty() {
        return Err(Error::InvalidArgs("Plan name is required".into()));
      }
      model.name = Set(name.to_string());
    }
    if let Some(rounds) = update.rounds {
      model.rounds = Set(rounds);
    }
    if let Some(price) = update.price {
      model.price = Set(price);
    }
    if let Some(active) = update.is_active {
      model.is_active = Set(active);
    }
    model.updated_at = Set(utils::now());

    let plan = model.update(&txn).await?;

    Audit::record(
      &txn,
      actor,
      "plan.update",
      Some(format!("plan:{id}")),
      Some(json::json!({
        "name": update.name,
        "rounds": update.rounds,
        "price": update.price,
        "is_active": update.is_active,
      })),
    )
    .await?;

    txn.commit().await?;
    Ok(plan)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::UserRole, sv::test_utils::test_db};

  #[tokio::test]
  async fn test_list_hides_inactive() {
    let db = test_db::setup().await;
    let sv = Plan::new(&db);
    let root = Actor::System;

    let cheap = sv.create(root, Game::Mines, "Cheap", 10, 500).await.unwrap();
    sv.create(root, Game::Dice, "Dice", 10, 500).await.unwrap();
    sv.update(root, cheap.id, PlanUpdate {
      is_active: Some(false),
      ..Default::default()
    })
    .await
    .unwrap();

    assert!(sv.list(Some(Game::Mines), false).await.unwrap().is_empty());
    assert_eq!(sv.list(Some(Game::Mines), true).await.unwrap().len(), 1);
    assert_eq!(sv.list(None, false).await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn test_update_validates_and_requires_admin() {
    let db = test_db::setup().await;
    let sv = Plan::new(&db);
    let plan = test_db::plan(&db, Game::Aviator, 10, 500).await;
    let staff = test_db::user(&db, "s@mail.com", UserRole::Assistant, 0).await;

    assert!(matches!(
      sv.update(Actor::user(&staff), plan.id, PlanUpdate::default()).await,
      Err(Error::Forbidden)
    ));
    assert!(matches!(
      sv.update(Actor::System, plan.id, PlanUpdate {
        price: Some(0),
        ..Default::default()
      })
      .await,
      Err(Error::InvalidArgs(_))
    ));

    let updated = sv
      .update(Actor::System, plan.id, PlanUpdate {
        price: Some(750),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(updated.price, 750);
    assert_eq!(updated.rounds, 10);
  }
}
