use super::{
  Actor, Audit, Notification, Page, Referral, balance, page_limit,
};
use crate::{
  entity::{TransactionStatus, TransactionType, license, transaction, user},
  prelude::*,
};

pub struct Payment<'a> {
  db: &'a DatabaseConnection,
}

fn settled(
  tx: transaction::Model,
  status: TransactionStatus,
  actor: &Actor,
) -> Result<transaction::ActiveModel> {
  if !tx.status.can_transition_to(status) {
    return Err(Error::InvalidTransition { from: tx.status, to: status });
  }

  Ok(transaction::ActiveModel {
    status: Set(status),
    processed_at: Set(Some(utils::now())),
    processed_by: Set(actor.id()),
    ..tx.into()
  })
}

impl<'a> Payment<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn pending(
    &self,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<transaction::Model>> {
    let limit = page_limit(limit);
    let mut query = transaction::Entity::find()
      .filter(transaction::Column::Status.eq(TransactionStatus::Pending));

    if let Some(cursor) = cursor {
      query = query.filter(transaction::Column::Id.lt(cursor));
    }

    let items = query
      .order_by_desc(transaction::Column::Id)
      .limit(limit + 1)
      .all(self.db)
      .await?;

    Ok(Page::new(items, limit, |tx| tx.id as i64))
  }

  pub async fn count_pending(&self) -> Result<u64> {
    Ok(
      transaction::Entity::find()
        .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
        .count(self.db)
        .await?,
    )
  }

  pub async fn verify(
    &self,
    actor: Actor,
    tx_id: i32,
  ) -> Result<transaction::Model> {
    actor.require_staff()?;

    let txn = self.db.begin().await?;
    let tx = transaction::Entity::find_by_id(tx_id)
      .one(&txn)
      .await?
      .ok_or(Error::TransactionNotFound)?;

    let user_id = tx.user_id;
    let amount = tx.amount;
    let tx_type = tx.tx_type;
    let license_key = tx.license_key.clone();
    let updated = settled(tx, TransactionStatus::Verified, &actor)?;

    let message = match tx_type {
      TransactionType::Purchase => {
        let key = license_key.ok_or(Error::LicenseNotFound)?;
        let license = license::Entity::find_by_id(&key)
          .one(&txn)
          .await?
          .ok_or(Error::LicenseNotFound)?;
        let (game, rounds) = (license.game, license.rounds_remaining);

        license::ActiveModel {
          payment_verified: Set(true),
          is_active: Set(rounds > 0),
          activated_at: Set(Some(utils::now())),
          ..license.into()
        }
        .update(&txn)
        .await?;

        let buyer = user::Entity::find_by_id(user_id)
          .one(&txn)
          .await?
          .ok_or(Error::UserNotFound)?;
        Referral::credit_commission(&txn, &buyer, -amount, Some(&key)).await?;

        format!("Your {game} license is active: {rounds} rounds available.")
      }
      TransactionType::Deposit => {
        balance::credit(&txn, user_id, amount).await?;
        format!("{} was added to your wallet.", utils::format_money(amount))
      }
      TransactionType::Withdrawal => {
        format!("Your withdrawal of {} was sent.", utils::format_money(-amount))
      }
      TransactionType::Commission => {
        return Err(Error::InvalidArgs(
          "Commissions are settled automatically".into(),
        ));
      }
    };

    let tx = updated.update(&txn).await?;

    Audit::record(
      &txn,
      actor,
      "payment.verify",
      Some(format!("transaction:{tx_id}")),
      Some(json::json!({ "type": tx_type, "amount": amount })),
    )
    .await?;
    Notification::notify(&txn, user_id, "Payment verified", &message).await?;

    txn.commit().await?;
    info!("Transaction {} verified by {}", tx_id, actor.label());
    Ok(tx)
  }

  pub async fn fail(
    &self,
    actor: Actor,
    tx_id: i32,
    reason: &str,
  ) -> Result<transaction::Model> {
    actor.require_staff()?;

    let txn = self.db.begin().await?;
    let tx = transaction::Entity::find_by_id(tx_id)
      .one(&txn)
      .await?
      .ok_or(Error::TransactionNotFound)?;

    let user_id = tx.user_id;
    let amount = tx.amount;
    let tx_type = tx.tx_type;
    let license_key = tx.license_key.clone();
    let updated = settled(tx, TransactionStatus::Failed, &actor)?;

    match tx_type {
      TransactionType::Purchase => {
        if let Some(key) = license_key
          && let Some(license) =
            license::Entity::find_by_id(&key).one(&txn).await?
        {
          license::ActiveModel { is_active: Set(false), ..license.into() }
            .update(&txn)
            .await?;
        }
      }
      TransactionType::Withdrawal => {
        balance::credit(&txn, user_id, -amount).await?;
      }
      TransactionType::Deposit | TransactionType::Commission => {}
    }

    let tx = updated.update(&txn).await?;

    let reason = match reason.trim() {
      "" => "not specified",
      reason => reason,
    };

    Audit::record(
      &txn,
      actor,
      "payment.fail",
      Some(format!("transaction:{tx_id}")),
      Some(json::json!({ "type": tx_type, "amount": amount, "reason": reason })),
    )
    .await?;

    let refund = if tx_type == TransactionType::Withdrawal {
      " The funds were returned to your wallet."
    } else {
      ""
    };
    Notification::notify(
      &txn,
      user_id,
      "Payment rejected",
      &format!(
        "Transaction #{tx_id} ({}) was rejected: {reason}.{refund}",
        utils::format_money(amount.abs())
      ),
    )
    .await?;

    txn.commit().await?;
    info!("Transaction {} failed by {}: {}", tx_id, actor.label(), reason);
    Ok(tx)
  }

  /// Fail everything still pending after `ttl`.
  pub async fn expire_stale(&self, ttl: Duration) -> Result<u64> {
    let delta = TimeDelta::from_std(ttl)
      .map_err(|e| Error::Internal(format!("pending ttl: {e}")))?;
    let cutoff = utils::now() - delta;

    let stale = transaction::Entity::find()
      .filter(transaction::Column::Status.eq(TransactionStatus::Pending))
      .filter(transaction::Column::CreatedAt.lt(cutoff))
      .all(self.db)
      .await?;

    let mut expired = 0;
    for tx in stale {
      match self.fail(Actor::System, tx.id, "payment window expired").await {
        Ok(_) => expired += 1,
        // Settled by staff in the meantime
        Err(Error::InvalidTransition { .. }) => {}
        Err(err) => return Err(err),
      }
    }

    Ok(expired)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::{Game, UserRole},
    sv::{Balance, License, license::PurchaseMethod, test_utils::test_db},
  };

  fn external() -> PurchaseMethod {
    PurchaseMethod::External { method: "bank".into(), reference: "REF-1".into() }
  }

  async fn reload_user(db: &DatabaseConnection, id: i64) -> user::Model {
    user::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
  }

  #[tokio::test]
  async fn test_verify_purchase_activates_license() {
    let db = test_db::setup().await;
    let staff = test_db::user(&db, "s@mail.com", UserRole::Assistant, 0).await;
    let referrer = test_db::user(&db, "r@mail.com", UserRole::User, 0).await;
    let buyer = test_db::referred_user(&db, "b@mail.com", &referrer).await;
    let plan = test_db::plan(&db, Game::Mines, 10, 1000).await;

    let (license, tx) =
      License::new(&db).purchase(buyer.id, plan.id, external()).await.unwrap();

    let tx = Payment::new(&db).verify(Actor::user(&staff), tx.id).await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Verified);
    assert_eq!(tx.processed_by, Some(staff.id));

    let license = License::new(&db).by_key(&license.key).await.unwrap();
    assert!(license.is_usable());
    assert!(license.activated_at.is_some());

    // 10% of $10.00
    assert_eq!(reload_user(&db, referrer.id).await.balance, 100);

    let unread =
      Notification::new(&db).unread_count(buyer.id).await.unwrap();
    assert_eq!(unread, 1);

    let audit = Audit::new(&db).list(Some("payment.verify"), None, None).await;
    assert_eq!(audit.unwrap().items.len(), 1);
  }

  #[tokio::test]
  async fn test_transactions_move_forward_only() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let tx = Balance::new(&db)
      .deposit_request(user.id, 500, "card", "REF-2")
      .await
      .unwrap();
    let sv = Payment::new(&db);

    sv.verify(Actor::System, tx.id).await.unwrap();
    assert_eq!(reload_user(&db, user.id).await.balance, 500);

    assert!(matches!(
      sv.verify(Actor::System, tx.id).await,
      Err(Error::InvalidTransition { .. })
    ));
    assert!(matches!(
      sv.fail(Actor::System, tx.id, "").await,
      Err(Error::InvalidTransition { .. })
    ));

    // Still credited exactly once
    assert_eq!(reload_user(&db, user.id).await.balance, 500);
  }

  #[tokio::test]
  async fn test_failed_withdrawal_is_refunded() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 1000).await;
    let tx = Balance::new(&db)
      .withdraw_request(user.id, 600, "wallet-1")
      .await
      .unwrap();
    assert_eq!(reload_user(&db, user.id).await.balance, 400);

    let tx = Payment::new(&db)
      .fail(Actor::Telegram(1), tx.id, "wrong wallet")
      .await
      .unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
    assert_eq!(reload_user(&db, user.id).await.balance, 1000);
  }

  #[tokio::test]
  async fn test_failed_purchase_keeps_license_locked() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let plan = test_db::plan(&db, Game::Dice, 10, 500).await;
    let (license, tx) =
      License::new(&db).purchase(user.id, plan.id, external()).await.unwrap();

    Payment::new(&db).fail(Actor::System, tx.id, "no funds").await.unwrap();

    let license = License::new(&db).by_key(&license.key).await.unwrap();
    assert!(!license.payment_verified);
    assert!(!license.is_usable());
  }

  #[tokio::test]
  async fn test_users_cannot_verify() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let tx = Balance::new(&db)
      .deposit_request(user.id, 500, "card", "REF-3")
      .await
      .unwrap();

    assert!(matches!(
      Payment::new(&db).verify(Actor::user(&user), tx.id).await,
      Err(Error::Forbidden)
    ));
  }

  #[tokio::test]
  async fn test_expire_stale() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let balance = Balance::new(&db);
    let old = balance.deposit_request(user.id, 100, "card", "OLD").await.unwrap();
    balance.deposit_request(user.id, 100, "card", "NEW").await.unwrap();

    transaction::ActiveModel {
      created_at: Set(utils::now() - TimeDelta::hours(72)),
      ..old.into()
    }
    .update(&db)
    .await
    .unwrap();

    let sv = Payment::new(&db);
    let expired =
      sv.expire_stale(Duration::from_secs(48 * 3600)).await.unwrap();
    assert_eq!(expired, 1);
    assert_eq!(sv.count_pending().await.unwrap(), 1);
  }
}
