use super::{Page, page_limit};
use crate::{
  entity::{UserRole, audit_log, user},
  prelude::*,
};

/// Who performed a back-office action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
  User { id: i64, role: UserRole },
  /// Admin chat configured for the Telegram bot.
  Telegram(i64),
  System,
}

impl Actor {
  pub fn user(user: &user::Model) -> Self {
    Actor::User { id: user.id, role: user.role }
  }

  pub fn id(&self) -> Option<i64> {
    match self {
      Actor::User { id, .. } => Some(*id),
      _ => None,
    }
  }

  pub fn role(&self) -> UserRole {
    match self {
      Actor::User { role, .. } => *role,
      Actor::Telegram(_) | Actor::System => UserRole::SuperAdmin,
    }
  }

  pub fn label(&self) -> String {
    match self {
      Actor::User { id, .. } => format!("user:{id}"),
      Actor::Telegram(chat) => format!("telegram:{chat}"),
      Actor::System => "system".into(),
    }
  }

  pub fn require_staff(&self) -> Result<()> {
    if self.role().is_staff() { Ok(()) } else { Err(Error::Forbidden) }
  }

  pub fn require_admin(&self) -> Result<()> {
    if self.role().is_admin() { Ok(()) } else { Err(Error::Forbidden) }
  }
}

pub struct Audit<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Audit<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Write an audit row on `conn`, usually the transaction of the mutation.
  pub async fn record<C: ConnectionTrait>(
    conn: &C,
    actor: Actor,
    action: &str,
    target: Option<String>,
    details: Option<json::Value>,
  ) -> Result<()> {
    debug!("audit: {} {} {:?}", actor.label(), action, target);

    audit_log::ActiveModel {
      id: NotSet,
      actor_id: Set(actor.id()),
      actor: Set(actor.label()),
      action: Set(action.to_string()),
      target: Set(target),
      details: Set(details),
      created_at: Set(utils::now()),
    }
    .insert(conn)
    .await?;

    Ok(())
  }

  pub async fn list(
    &self,
    action: Option<&str>,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<audit_log::Model>> {
    let limit = page_limit(limit);
    let mut query = audit_log::Entity::find();

    if let Some(action) = action {
      query = query.filter(audit_log::Column::Action.eq(action));
    }
    if let Some(cursor) = cursor {
      query = query.filter(audit_log::Column::Id.lt(cursor));
    }

    let items = query
      .order_by_desc(audit_log::Column::Id)
      .limit(limit + 1)
      .all(self.db)
      .await?;

    Ok(Page::new(items, limit, |log| log.id as i64))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_record_and_filter() {
    let db = test_db::setup().await;
    let actor = Actor::Telegram(42);

    Audit::record(&db, actor, "plan.update", Some("plan:1".into()), None)
      .await
      .unwrap();
    Audit::record(&db, Actor::System, "payment.expire", None, None)
      .await
      .unwrap();

    let page = Audit::new(&db).list(Some("plan.update"), None, None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].actor, "telegram:42");
    assert_eq!(page.items[0].actor_id, None);
  }

  #[test]
  fn actor_roles() {
    let user = Actor::User { id: 7, role: UserRole::Assistant };
    assert!(user.require_staff().is_ok());
    assert!(matches!(user.require_admin(), Err(Error::Forbidden)));
    assert_eq!(user.label(), "user:7");
    assert!(Actor::System.require_admin().is_ok());
  }
}
