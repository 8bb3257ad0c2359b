use super::{Page, page_limit};
use crate::{
  entity::{TransactionStatus, TransactionType, transaction, user},
  prelude::*,
};

/// Fields of a ledger row; the rest is filled in by [`record`].
#[derive(Debug, Default)]
pub struct NewTransaction {
  pub user_id: i64,
  pub amount: i64,
  pub tx_type: TransactionType,
  pub status: TransactionStatus,
  pub method: Option<String>,
  pub reference: Option<String>,
  pub license_key: Option<String>,
  pub description: Option<String>,
  pub processed_by: Option<i64>,
}

pub async fn record<C: ConnectionTrait>(
  conn: &C,
  tx: NewTransaction,
) -> Result<transaction::Model> {
  let now = utils::now();
  let settled = tx.status != TransactionStatus::Pending;

  Ok(
    transaction::ActiveModel {
      id: NotSet,
      user_id: Set(tx.user_id),
      amount: Set(tx.amount),
      tx_type: Set(tx.tx_type),
      status: Set(tx.status),
      method: Set(tx.method),
      reference: Set(tx.reference),
      license_key: Set(tx.license_key),
      description: Set(tx.description),
      created_at: Set(now),
      processed_at: Set(settled.then_some(now)),
      processed_by: Set(tx.processed_by),
    }
    .insert(conn)
    .await?,
  )
}

pub async fn credit<C: ConnectionTrait>(
  conn: &C,
  user_id: i64,
  amount: i64,
) -> Result<user::Model> {
  if amount <= 0 {
    return Err(Error::InvalidArgs("Credit amount must be positive".into()));
  }

  let user = user::Entity::find_by_id(user_id)
    .one(conn)
    .await?
    .ok_or(Error::UserNotFound)?;

  let balance = user.balance + amount;
  Ok(
    user::ActiveModel { balance: Set(balance), ..user.into() }
      .update(conn)
      .await?,
  )
}

pub async fn debit<C: ConnectionTrait>(
  conn: &C,
  user_id: i64,
  amount: i64,
) -> Result<user::Model> {
  if amount <= 0 {
    return Err(Error::InvalidArgs("Debit amount must be positive".into()));
  }

  let user = user::Entity::find_by_id(user_id)
    .one(conn)
    .await?
    .ok_or(Error::UserNotFound)?;

  if user.balance < amount {
    return Err(Error::InsufficientBalance);
  }

  let balance = user.balance - amount;
  Ok(
    user::ActiveModel { balance: Set(balance), ..user.into() }
      .update(conn)
      .await?,
  )
}

pub struct Balance<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Balance<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get(&self, user_id: i64) -> Result<i64> {
    let user = user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;
    Ok(user.balance)
  }

  /// A top-up paid outside the platform; credited once staff verify it.
  pub async fn deposit_request(
    &self,
    user_id: i64,
    amount: i64,
    method: &str,
    reference: &str,
  ) -> Result<transaction::Model> {
    if amount <= 0 {
      return Err(Error::InvalidArgs("Deposit amount must be positive".into()));
    }
    if reference.trim().is_empty() {
      return Err(Error::InvalidArgs("Payment reference is required".into()));
    }

    user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;

    record(self.db, NewTransaction {
      user_id,
      amount,
      tx_type: TransactionType::Deposit,
      status: TransactionStatus::Pending,
      method: Some(method.trim().to_string()),
      reference: Some(reference.trim().to_string()),
      description: Some(format!("Deposit {}", utils::format_money(amount))),
      ..Default::default()
    })
    .await
  }

  /// Reserve funds right away; a failed payout refunds them.
  pub async fn withdraw_request(
    &self,
    user_id: i64,
    amount: i64,
    destination: &str,
  ) -> Result<transaction::Model> {
    if amount <= 0 {
      return Err(Error::InvalidArgs(
        "Withdrawal amount must be positive".into(),
      ));
    }
    if destination.trim().is_empty() {
      return Err(Error::InvalidArgs("Payout destination is required".into()));
    }

    let txn = self.db.begin().await?;

    debit(&txn, user_id, amount).await?;
    let tx = record(&txn, NewTransaction {
      user_id,
      amount: -amount,
      tx_type: TransactionType::Withdrawal,
      status: TransactionStatus::Pending,
      reference: Some(destination.trim().to_string()),
      description: Some(format!("Withdrawal {}", utils::format_money(amount))),
      ..Default::default()
    })
    .await?;

    txn.commit().await?;
    Ok(tx)
  }

  pub async fn transactions(
    &self,
    user_id: i64,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<transaction::Model>> {
    let limit = page_limit(limit);
    let mut query =
      transaction::Entity::find().filter(transaction::Column::UserId.eq(user_id));

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
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::UserRole, sv::test_utils::test_db};

  #[tokio::test]
  async fn test_deposit_request_is_pending() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let sv = Balance::new(&db);

    let tx = sv.deposit_request(user.id, 1000, "momo", "TX-1").await.unwrap();
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.amount, 1000);
    assert!(tx.processed_at.is_none());

    // Nothing is credited until verification
    assert_eq!(sv.get(user.id).await.unwrap(), 0);

    assert!(matches!(
      sv.deposit_request(user.id, 1000, "momo", " ").await,
      Err(Error::InvalidArgs(_))
    ));
  }

  #[tokio::test]
  async fn test_withdraw_reserves_balance() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 1000).await;
    let sv = Balance::new(&db);

    let tx = sv.withdraw_request(user.id, 400, "wallet-123").await.unwrap();
    assert_eq!(tx.amount, -400);
    assert_eq!(tx.tx_type, TransactionType::Withdrawal);
    assert_eq!(sv.get(user.id).await.unwrap(), 600);
  }

  #[tokio::test]
  async fn test_insufficient_balance() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 100).await;
    let sv = Balance::new(&db);

    let result = sv.withdraw_request(user.id, 500, "wallet-123").await;
    assert!(matches!(result, Err(Error::InsufficientBalance)));

    assert_eq!(sv.get(user.id).await.unwrap(), 100);
    let page = sv.transactions(user.id, None, None).await.unwrap();
    assert!(page.items.is_empty());
  }

  #[tokio::test]
  async fn test_credit_and_debit_helpers() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;

    assert_eq!(credit(&db, user.id, 250).await.unwrap().balance, 250);
    assert_eq!(debit(&db, user.id, 50).await.unwrap().balance, 200);
    assert!(matches!(credit(&db, user.id, 0).await, Err(Error::InvalidArgs(_))));
    assert!(matches!(debit(&db, user.id, 201).await, Err(Error::InsufficientBalance)));
  }
}
