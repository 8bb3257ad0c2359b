use sea_orm::sea_query::Expr;
use serde::Serialize;

use super::{License, Payment, User};
use crate::{
  entity::{
    Feedback, TransactionStatus, TransactionType, prediction, transaction, user,
  },
  prelude::*,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct Dashboard {
  pub users: u64,
  pub suspended: u64,
  pub new_users_today: u64,
  pub active_licenses: u64,
  pub pending_transactions: u64,
  /// Verified plan sales, in cents.
  pub revenue: i64,
  pub commissions: i64,
  pub predictions: u64,
  pub predictions_today: u64,
  pub won: u64,
  pub lost: u64,
}

impl Dashboard {
  /// Share of answered predictions marked as won.
  pub fn win_rate(&self) -> Option<f64> {
    let answered = self.won + self.lost;
    (answered > 0).then(|| self.won as f64 * 100.0 / answered as f64)
  }

  pub fn to_html(&self) -> String {
    let win_rate = self
      .win_rate()
      .map(|r| format!("{r:.1}%"))
      .unwrap_or_else(|| "n/a".into());

    format!(
      "<b>PredictPro dashboard</b>\n\n\
       Users: <b>{}</b> (+{} today, {} suspended)\n\
       Active licenses: <b>{}</b>\n\
       Pending payments: <b>{}</b>\n\
       Revenue: <b>{}</b>\n\
       Commissions paid: <b>{}</b>\n\
       Predictions: <b>{}</b> (+{} today)\n\
       Feedback: {} won / {} lost ({})",
      self.users,
      self.new_users_today,
      self.suspended,
      self.active_licenses,
      self.pending_transactions,
      utils::format_money(self.revenue),
      utils::format_money(self.commissions),
      self.predictions,
      self.predictions_today,
      self.won,
      self.lost,
      win_rate,
    )
  }
}

pub struct Stats<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Stats<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  async fn verified_sum(&self, tx_type: TransactionType) -> Result<i64> {
    let sum: Option<Option<i64>> = transaction::Entity::find()
      .select_only()
      .column_as(Expr::col(transaction::Column::Amount).sum(), "total")
      .filter(transaction::Column::TxType.eq(tx_type))
      .filter(transaction::Column::Status.eq(TransactionStatus::Verified))
      .into_tuple()
      .one(self.db)
      .await?;
    Ok(sum.flatten().unwrap_or(0))
  }

  async fn feedback_count(&self, feedback: Feedback) -> Result<u64> {
    Ok(
      prediction::Entity::find()
        .filter(prediction::Column::Feedback.eq(feedback))
        .count(self.db)
        .await?,
    )
  }

  pub async fn dashboard(&self) -> Result<Dashboard> {
    let today = utils::now().date().and_hms_opt(0, 0, 0).unwrap_or_default();

    let suspended = user::Entity::find()
      .filter(user::Column::IsSuspended.eq(true))
      .count(self.db)
      .await?;
    let new_users_today = user::Entity::find()
      .filter(user::Column::CreatedAt.gte(today))
      .count(self.db)
      .await?;
    let predictions_today = prediction::Entity::find()
      .filter(prediction::Column::CreatedAt.gte(today))
      .count(self.db)
      .await?;

    Ok(Dashboard {
      users: User::new(self.db).count().await?,
      suspended,
      new_users_today,
      active_licenses: License::new(self.db).count_active().await?,
      pending_transactions: Payment::new(self.db).count_pending().await?,
      // Purchases are stored as debits
      revenue: -self.verified_sum(TransactionType::Purchase).await?,
      commissions: self.verified_sum(TransactionType::Commission).await?,
      predictions: prediction::Entity::find().count(self.db).await?,
      predictions_today,
      won: self.feedback_count(Feedback::Won).await?,
      lost: self.feedback_count(Feedback::Lost).await?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::{Game, UserRole},
    sv::{Actor, Balance, license::PurchaseMethod, test_utils::test_db},
  };

  #[tokio::test]
  async fn test_dashboard_counts() {
    let db = test_db::setup().await;
    let referrer = test_db::user(&db, "r@mail.com", UserRole::User, 0).await;
    let buyer = test_db::referred_user(&db, "b@mail.com", &referrer).await;
    crate::sv::balance::credit(&db, buyer.id, 5000).await.unwrap();
    let plan = test_db::plan(&db, Game::Aviator, 10, 2000).await;

    License::new(&db)
      .purchase(buyer.id, plan.id, PurchaseMethod::Wallet)
      .await
      .unwrap();
    Balance::new(&db)
      .deposit_request(buyer.id, 1000, "card", "R-1")
      .await
      .unwrap();
    License::new(&db)
      .grant(Actor::System, referrer.id, Game::Dice, 5)
      .await
      .unwrap();

    let stats = Stats::new(&db).dashboard().await.unwrap();
    assert_eq!(stats.users, 2);
    assert_eq!(stats.new_users_today, 2);
    assert_eq!(stats.active_licenses, 2);
    assert_eq!(stats.pending_transactions, 1);
    assert_eq!(stats.revenue, 2000);
    assert_eq!(stats.commissions, 200);
    assert_eq!(stats.win_rate(), None);
    assert!(stats.to_html().contains("$20.00"));
  }
}
