use super::{Actor, Audit, Page, page_limit};
use crate::{
  entity::{license, user, user::UserRole},
  prelude::*,
};

pub struct User<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> User<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn by_id(&self, id: i64) -> Result<Option<user::Model>> {
    Ok(user::Entity::find_by_id(id).one(self.db).await?)
  }

  pub async fn get(&self, id: i64) -> Result<user::Model> {
    self.by_id(id).await?.ok_or(Error::UserNotFound)
  }

  pub async fn list(
    &self,
    role: Option<UserRole>,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<user::Model>> {
    let limit = page_limit(limit);
    let mut query = user::Entity::find();

    if let Some(role) = role {
      query = query.filter(user::Column::Role.eq(role));
    }
    if let Some(cursor) = cursor {
      query = query.filter(user::Column::Id.lt(cursor));
    }

    let users = query
      .order_by_desc(user::Column::Id)
      .limit(limit + 1)
      .all(self.db)
      .await?;

    Ok(Page::new(users, limit, |u| u.id))
  }

  pub async fn with_licenses(
    &self,
    id: i64,
  ) -> Result<(user::Model, Vec<license::Model>)> {
    let user = self.get(id).await?;
    let licenses = license::Entity::find()
      .filter(license::Column::UserId.eq(id))
      .order_by_desc(license::Column::CreatedAt)
      .all(self.db)
      .await?;
    Ok((user, licenses))
  }

  /// Guard shared by role changes and suspensions.
  fn check_authority(actor: &Actor, target: &user::Model) -> Result<()> {
    actor.require_admin()?;

    if actor.id() == Some(target.id) {
      return Err(Error::InvalidArgs("You cannot modify your own account".into()));
    }
    if actor.role() != UserRole::SuperAdmin
      && target.role.rank() >= actor.role().rank()
    {
      return Err(Error::Forbidden);
    }

    Ok(())
  }

  pub async fn set_role(
    &self,
    actor: Actor,
    target_id: i64,
    role: UserRole,
  ) -> Result<user::Model> {
    let txn = self.db.begin().await?;

    let target = user::Entity::find_by_id(target_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;

    Self::check_authority(&actor, &target)?;
    if !actor.role().can_assign(target.role, role) {
      return Err(Error::Forbidden);
    }

    let previous = target.role;
    let updated = user::ActiveModel { role: Set(role), ..target.into() }
      .update(&txn)
      .await?;

    Audit::record(
      &txn,
      actor,
      "user.role",
      Some(format!("user:{target_id}")),
      Some(json::json!({ "from": previous, "to": role })),
    )
    .await?;

    txn.commit().await?;
    info!("User {} role {:?} -> {:?} by {}", target_id, previous, role, actor.label());
    Ok(updated)
  }

  pub async fn set_suspended(
    &self,
    actor: Actor,
    target_id: i64,
    suspended: bool,
  ) -> Result<user::Model> {
    let txn = self.db.begin().await?;

    let target = user::Entity::find_by_id(target_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;

    Self::check_authority(&actor, &target)?;

    let updated =
      user::ActiveModel { is_suspended: Set(suspended), ..target.into() }
        .update(&txn)
        .await?;

    Audit::record(
      &txn,
      actor,
      if suspended { "user.suspend" } else { "user.unsuspend" },
      Some(format!("user:{target_id}")),
      None,
    )
    .await?;

    txn.commit().await?;
    Ok(updated)
  }

  pub async fn count(&self) -> Result<u64> {
    Ok(user::Entity::find().count(self.db).await?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn test_admin_promotes_user_to_assistant() {
    let db = test_db::setup().await;
    let admin = test_db::user(&db, "admin@mail.com", UserRole::Admin, 0).await;
    let user = test_db::user(&db, "user@mail.com", UserRole::User, 0).await;

    let updated = User::new(&db)
      .set_role(Actor::user(&admin), user.id, UserRole::Assistant)
      .await
      .unwrap();
    assert_eq!(updated.role, UserRole::Assistant);

    let audit = Audit::new(&db).list(Some("user.role"), None, None).await.unwrap();
    assert_eq!(audit.items.len(), 1);
    assert_eq!(audit.items[0].actor_id, Some(admin.id));
  }

  #[tokio::test]
  async fn test_admin_cannot_create_admins_or_touch_peers() {
    let db = test_db::setup().await;
    let admin = test_db::user(&db, "a1@mail.com", UserRole::Admin, 0).await;
    let peer = test_db::user(&db, "a2@mail.com", UserRole::Admin, 0).await;
    let user = test_db::user(&db, "u@mail.com", UserRole::User, 0).await;
    let sv = User::new(&db);

    assert!(matches!(
      sv.set_role(Actor::user(&admin), user.id, UserRole::Admin).await,
      Err(Error::Forbidden)
    ));
    assert!(matches!(
      sv.set_suspended(Actor::user(&admin), peer.id, true).await,
      Err(Error::Forbidden)
    ));
    assert!(matches!(
      sv.set_role(Actor::user(&admin), admin.id, UserRole::User).await,
      Err(Error::InvalidArgs(_))
    ));
  }

  #[tokio::test]
  async fn test_super_admin_manages_admins() {
    let db = test_db::setup().await;
    let root = test_db::user(&db, "r@mail.com", UserRole::SuperAdmin, 0).await;
    let admin = test_db::user(&db, "a@mail.com", UserRole::Admin, 0).await;
    let sv = User::new(&db);

    let demoted =
      sv.set_role(Actor::user(&root), admin.id, UserRole::User).await.unwrap();
    assert_eq!(demoted.role, UserRole::User);

    let suspended =
      sv.set_suspended(Actor::user(&root), admin.id, true).await.unwrap();
    assert!(suspended.is_suspended);
  }

  #[tokio::test]
  async fn test_list_paginates_by_cursor() {
    let db = test_db::setup().await;
    for i in 0..5 {
      test_db::user(&db, &format!("u{i}@mail.com"), UserRole::User, 0).await;
    }
    let sv = User::new(&db);

    let first = sv.list(None, None, Some(3)).await.unwrap();
    assert_eq!(first.items.len(), 3);
    let cursor = first.next_cursor.unwrap();

    let second = sv.list(None, Some(cursor), Some(3)).await.unwrap();
    assert_eq!(second.items.len(), 2);
    assert!(second.next_cursor.is_none());
    assert!(second.items.iter().all(|u| u.id < cursor));
  }
}
