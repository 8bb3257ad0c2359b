use serde::Serialize;

use super::{
  Actor, Audit,
  balance::{self, NewTransaction},
};
use crate::{
  entity::{TransactionStatus, TransactionType, user},
  prelude::*,
};

pub struct Referral<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Serialize)]
pub struct ReferralStats {
  pub code: String,
  pub commission_rate: i32,
  pub total_sales: i32,
  pub total_earnings: i64,
  pub referrals: u64,
}

/// Public view of a referred account.
#[derive(Debug, Serialize)]
pub struct Referee {
  pub id: i64,
  pub display_name: String,
  pub joined_at: DateTime,
}

pub fn commission(sale_amount: i64, rate: i32) -> i64 {
  sale_amount * rate as i64 / 100
}

impl<'a> Referral<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Pay the buyer's referrer their cut of a verified sale.
  /// Returns the commission credited, zero when there is none.
  pub async fn credit_commission<C: ConnectionTrait>(
    conn: &C,
    buyer: &user::Model,
    sale_amount: i64,
    license_key: Option<&str>,
  ) -> Result<i64> {
    let Some(referrer_id) = buyer.referred_by else {
      return Ok(0);
    };

    let Some(referrer) = user::Entity::find_by_id(referrer_id).one(conn).await?
    else {
      warn!("Referrer {} of user {} is gone", referrer_id, buyer.id);
      return Ok(0);
    };

    let amount = commission(sale_amount, referrer.commission_rate);
    if amount <= 0 {
      return Ok(0);
    }

    user::ActiveModel {
      balance: Set(referrer.balance + amount),
      referral_sales: Set(referrer.referral_sales + 1),
      referral_earnings: Set(referrer.referral_earnings + amount),
      ..referrer.into()
    }
    .update(conn)
    .await?;

    balance::record(conn, NewTransaction {
      user_id: referrer_id,
      amount,
      tx_type: TransactionType::Commission,
      status: TransactionStatus::Verified,
      license_key: license_key.map(str::to_string),
      description: Some(format!("Commission from {}", buyer.display_name)),
      ..Default::default()
    })
    .await?;

    info!(
      "Referrer {} earned {} from user {}",
      referrer_id,
      utils::format_money(amount),
      buyer.id
    );
    Ok(amount)
  }

  pub async fn stats(&self, user_id: i64) -> Result<ReferralStats> {
    let user = user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;

    let referrals = user::Entity::find()
      .filter(user::Column::ReferredBy.eq(user_id))
      .count(self.db)
      .await?;

    Ok(ReferralStats {
      code: user.referral_code,
      commission_rate: user.commission_rate,
      total_sales: user.referral_sales,
      total_earnings: user.referral_earnings,
      referrals,
    })
  }

  pub async fn referrals(&self, user_id: i64) -> Result<Vec<Referee>> {
    let users = user::Entity::find()
      .filter(user::Column::ReferredBy.eq(user_id))
      .order_by_desc(user::Column::CreatedAt)
      .all(self.db)
      .await?;

    Ok(
      users
        .into_iter()
        .map(|u| Referee {
          id: u.id,
          display_name: u.display_name,
          joined_at: u.created_at,
        })
        .collect(),
    )
  }

  pub async fn set_commission_rate(
    &self,
    actor: Actor,
    user_id: i64,
    rate: i32,
  ) -> Result<user::Model> {
    actor.require_admin()?;
    if !(0..=100).contains(&rate) {
      return Err(Error::InvalidArgs(
        "Commission rate must be between 0 and 100".into(),
      ));
    }

    let txn = self.db.begin().await?;
    let user = user::Entity::find_by_id(user_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;

    let previous = user.commission_rate;
    let user = user::ActiveModel { commission_rate: Set(rate), ..user.into() }
      .update(&txn)
      .await?;

    Audit::record(
      &txn,
      actor,
      "referral.rate",
      Some(format!("user:{user_id}")),
      Some(json::json!({ "from": previous, "to": rate })),
    )
    .await?;

    txn.commit().await?;
    Ok(user)
  }

  /// Referrers ranked by lifetime earnings.
  pub async fn top(&self, limit: u64) -> Result<Vec<user::Model>> {
    Ok(
      user::Entity::find()
        .filter(user::Column::ReferralSales.gt(0))
        .order_by_desc(user::Column::ReferralEarnings)
        .limit(limit)
        .all(self.db)
        .await?,
    )
  }
}
