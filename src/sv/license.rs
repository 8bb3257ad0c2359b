use sea_orm::Select;
use serde::Deserialize;
use uuid::Uuid;

use super::{
  Actor, Audit, Notification, Referral,
  balance::{self, NewTransaction},
};
use crate::{
  entity::{Game, TransactionStatus, TransactionType, license, plan, transaction, user},
  prelude::*,
};

/// How a plan gets paid for.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PurchaseMethod {
  Wallet,
  /// Paid outside the platform; staff match the reference by hand.
  External { method: String, reference: String },
}

pub struct License<'a> {
  db: &'a DatabaseConnection,
}

/// Verified, active licenses with rounds left, oldest first.
pub fn usable_query(user_id: i64, game: Game) -> Select<license::Entity> {
  license::Entity::find()
    .filter(license::Column::UserId.eq(user_id))
    .filter(license::Column::Game.eq(game))
    .filter(license::Column::PaymentVerified.eq(true))
    .filter(license::Column::IsActive.eq(true))
    .filter(license::Column::RoundsRemaining.gt(0))
    .order_by_asc(license::Column::CreatedAt)
    .order_by_asc(license::Column::Key)
}

impl<'a> License<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn purchase(
    &self,
    user_id: i64,
    plan_id: i32,
    method: PurchaseMethod,
  ) -> Result<(license::Model, transaction::Model)> {
    if let PurchaseMethod::External { reference, .. } = &method
      && reference.trim().is_empty()
    {
      return Err(Error::InvalidArgs("Payment reference is required".into()));
    }

    let txn = self.db.begin().await?;

    let buyer = user::Entity::find_by_id(user_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;
    if buyer.is_suspended {
      return Err(Error::Suspended);
    }

    let plan = plan::Entity::find_by_id(plan_id)
      .one(&txn)
      .await?
      .ok_or(Error::PlanNotFound)?;
    if !plan.is_active {
      return Err(Error::PlanInactive);
    }

    let paid = matches!(method, PurchaseMethod::Wallet);
    let now = utils::now();

    if paid {
      balance::debit(&txn, user_id, plan.price).await?;
    }

    let license = license::ActiveModel {
      key: Set(Uuid::new_v4().to_string()),
      user_id: Set(user_id),
      game: Set(plan.game),
      plan_id: Set(Some(plan.id)),
      rounds_total: Set(plan.rounds),
      rounds_remaining: Set(plan.rounds),
      payment_verified: Set(paid),
      is_active: Set(paid),
      created_at: Set(now),
      activated_at: Set(paid.then_some(now)),
    }
    .insert(&txn)
    .await?;

    let (method, reference, status) = match method {
      PurchaseMethod::Wallet => {
        ("wallet".to_string(), None, TransactionStatus::Verified)
      }
      PurchaseMethod::External { method, reference } => (
        method.trim().to_string(),
        Some(reference.trim().to_string()),
        TransactionStatus::Pending,
      ),
    };

    let tx = balance::record(&txn, NewTransaction {
      user_id,
      amount: -plan.price,
      tx_type: TransactionType::Purchase,
      status,
      method: Some(method),
      reference,
      license_key: Some(license.key.clone()),
      description: Some(format!("{} ({} rounds)", plan.name, plan.rounds)),
      ..Default::default()
    })
    .await?;

    if paid {
      Referral::credit_commission(&txn, &buyer, plan.price, Some(&license.key))
        .await?;
    }

    txn.commit().await?;

    info!(
      "User {} bought {} plan {} via {} ({})",
      user_id,
      plan.game,
      plan.id,
      tx.method.as_deref().unwrap_or("?"),
      if paid { "active" } else { "awaiting verification" }
    );
    Ok((license, tx))
  }

  /// Gift a ready-to-use license.
  pub async fn grant(
    &self,
    actor: Actor,
    user_id: i64,
    game: Game,
    rounds: i32,
  ) -> Result<license::Model> {
    actor.require_admin()?;
    if rounds <= 0 {
      return Err(Error::InvalidArgs("Rounds must be positive".into()));
    }

    let txn = self.db.begin().await?;
    user::Entity::find_by_id(user_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;

    let now = utils::now();
    let license = license::ActiveModel {
      key: Set(Uuid::new_v4().to_string()),
      user_id: Set(user_id),
      game: Set(game),
      plan_id: Set(None),
      rounds_total: Set(rounds),
      rounds_remaining: Set(rounds),
      payment_verified: Set(true),
      is_active: Set(true),
      created_at: Set(now),
      activated_at: Set(Some(now)),
    }
    .insert(&txn)
    .await?;

    Audit::record(
      &txn,
      actor,
      "license.grant",
      Some(format!("license:{}", license.key)),
      Some(json::json!({ "user_id": user_id, "game": game, "rounds": rounds })),
    )
    .await?;

    Notification::notify(
      &txn,
      user_id,
      "License granted",
      &format!("You received {rounds} free {game} rounds."),
    )
    .await?;

    txn.commit().await?;
    Ok(license)
  }

  pub async fn by_key(&self, key: &str) -> Result<license::Model> {
    license::Entity::find_by_id(key)
      .one(self.db)
      .await?
      .ok_or(Error::LicenseNotFound)
  }

  pub async fn by_user(&self, user_id: i64) -> Result<Vec<license::Model>> {
    Ok(
      license::Entity::find()
        .filter(license::Column::UserId.eq(user_id))
        .order_by_desc(license::Column::CreatedAt)
        .all(self.db)
        .await?,
    )
  }

  pub async fn usable(
    &self,
    user_id: i64,
    game: Game,
  ) -> Result<Vec<license::Model>> {
    Ok(usable_query(user_id, game).all(self.db).await?)
  }

  /// Rounds left across every usable license of a game.
  pub async fn rounds_left(&self, user_id: i64, game: Game) -> Result<i64> {
    Ok(
      self
        .usable(user_id, game)
        .await?
        .iter()
        .map(|l| l.rounds_remaining as i64)
        .sum(),
    )
  }

  pub async fn set_active(
    &self,
    actor: Actor,
    key: &str,
    active: bool,
  ) -> Result<license::Model> {
    actor.require_admin()?;

    let txn = self.db.begin().await?;
    let license = license::Entity::find_by_id(key)
      .one(&txn)
      .await?
      .ok_or(Error::LicenseNotFound)?;

    if active && (!license.payment_verified || license.rounds_remaining <= 0) {
      return Err(Error::LicenseInvalid);
    }

    let activated_at = match (active, license.activated_at) {
      (true, None) => Some(utils::now()),
      (_, at) => at,
    };

    let license = license::ActiveModel {
      is_active: Set(active),
      activated_at: Set(activated_at),
      ..license.into()
    }
    .update(&txn)
    .await?;

    Audit::record(
      &txn,
      actor,
      if active { "license.activate" } else { "license.deactivate" },
      Some(format!("license:{key}")),
      None,
    )
    .await?;

    txn.commit().await?;
    Ok(license)
  }

  pub async fn count_active(&self) -> Result<u64> {
    Ok(
      license::Entity::find()
        .filter(license::Column::PaymentVerified.eq(true))
        .filter(license::Column::IsActive.eq(true))
        .filter(license::Column::RoundsRemaining.gt(0))
        .count(self.db)
        .await?,
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::UserRole, sv::test_utils::test_db};

  fn external() -> PurchaseMethod {
    PurchaseMethod::External { method: "momo".into(), reference: "TX-77".into() }
  }

  #[tokio::test]
  async fn test_external_purchase_is_pending() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let plan = test_db::plan(&db, Game::Mines, 10, 500).await;
    let sv = License::new(&db);

    let (license, tx) = sv.purchase(user.id, plan.id, external()).await.unwrap();
    assert!(!license.payment_verified);
    assert!(!license.is_active);
    assert_eq!(license.rounds_remaining, 10);
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.amount, -500);
    assert_eq!(tx.license_key.as_deref(), Some(license.key.as_str()));

    assert!(sv.usable(user.id, Game::Mines).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_wallet_purchase_activates_and_pays_referrer() {
    let db = test_db::setup().await;
    let referrer = test_db::user(&db, "ref@mail.com", UserRole::User, 0).await;
    let buyer = test_db::referred_user(&db, "b@mail.com", &referrer).await;
    balance::credit(&db, buyer.id, 1000).await.unwrap();
    let plan = test_db::plan(&db, Game::Dice, 20, 800).await;
    let sv = License::new(&db);

    let (license, tx) =
      sv.purchase(buyer.id, plan.id, PurchaseMethod::Wallet).await.unwrap();
    assert!(license.is_usable());
    assert_eq!(tx.status, TransactionStatus::Verified);

    let buyer = user::Entity::find_by_id(buyer.id).one(&db).await.unwrap().unwrap();
    assert_eq!(buyer.balance, 200);
    let referrer =
      user::Entity::find_by_id(referrer.id).one(&db).await.unwrap().unwrap();
    assert_eq!(referrer.balance, 80);

    assert_eq!(sv.rounds_left(buyer.id, Game::Dice).await.unwrap(), 20);
    assert_eq!(sv.count_active().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_wallet_purchase_rolls_back_without_funds() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 100).await;
    let plan = test_db::plan(&db, Game::Dice, 20, 800).await;
    let sv = License::new(&db);

    let result = sv.purchase(user.id, plan.id, PurchaseMethod::Wallet).await;
    assert!(matches!(result, Err(Error::InsufficientBalance)));
    assert!(sv.by_user(user.id).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_inactive_plan_is_not_sold() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let plan = test_db::plan(&db, Game::Roulette, 10, 500).await;
    plan::ActiveModel { is_active: Set(false), ..plan.clone().into() }
      .update(&db)
      .await
      .unwrap();

    assert!(matches!(
      License::new(&db).purchase(user.id, plan.id, external()).await,
      Err(Error::PlanInactive)
    ));
  }

  #[tokio::test]
  async fn test_grant_and_toggle() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let sv = License::new(&db);

    let license =
      sv.grant(Actor::System, user.id, Game::Aviator, 5).await.unwrap();
    assert!(license.is_usable());

    let off = sv.set_active(Actor::System, &license.key, false).await.unwrap();
    assert!(!off.is_usable());
    let on = sv.set_active(Actor::System, &license.key, true).await.unwrap();
    assert!(on.is_usable());

    assert!(matches!(
      sv.grant(Actor::user(&user), user.id, Game::Aviator, 5).await,
      Err(Error::Forbidden)
    ));
  }

  #[tokio::test]
  async fn test_cannot_activate_unverified() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let plan = test_db::plan(&db, Game::Mines, 10, 500).await;
    let sv = License::new(&db);

    let (license, _) = sv.purchase(user.id, plan.id, external()).await.unwrap();
    assert!(matches!(
      sv.set_active(Actor::System, &license.key, true).await,
      Err(Error::LicenseInvalid)
    ));
  }
}
