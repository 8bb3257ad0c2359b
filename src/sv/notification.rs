use super::{Page, page_limit};
use crate::{entity::notification, prelude::*};

pub struct Notification<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Notification<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Queue an in-app message for a single user on `conn`.
  pub async fn notify<C: ConnectionTrait>(
    conn: &C,
    user_id: i64,
    title: &str,
    body: &str,
  ) -> Result<notification::Model> {
    Ok(
      notification::ActiveModel {
        id: NotSet,
        user_id: Set(user_id),
        broadcast_id: Set(None),
        title: Set(title.to_string()),
        body: Set(body.to_string()),
        is_read: Set(false),
        created_at: Set(utils::now()),
      }
      .insert(conn)
      .await?,
    )
  }

  pub async fn list(
    &self,
    user_id: i64,
    unread_only: bool,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<notification::Model>> {
    let limit = page_limit(limit);
    let mut query = notification::Entity::find()
      .filter(notification::Column::UserId.eq(user_id));

    if unread_only {
      query = query.filter(notification::Column::IsRead.eq(false));
    }
    if let Some(cursor) = cursor {
      query = query.filter(notification::Column::Id.lt(cursor));
    }

    let items = query
      .order_by_desc(notification::Column::Id)
      .limit(limit + 1)
      .all(self.db)
      .await?;

    Ok(Page::new(items, limit, |n| n.id as i64))
  }

  pub async fn unread_count(&self, user_id: i64) -> Result<u64> {
    Ok(
      notification::Entity::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::IsRead.eq(false))
        .count(self.db)
        .await?,
    )
  }

  /// Returns false when the notification does not belong to the user.
  pub async fn mark_read(&self, user_id: i64, id: i32) -> Result<bool> {
    let result = notification::Entity::update_many()
      .col_expr(notification::Column::IsRead, true.into())
      .filter(notification::Column::Id.eq(id))
      .filter(notification::Column::UserId.eq(user_id))
      .exec(self.db)
      .await?;
    Ok(result.rows_affected > 0)
  }

  pub async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
    let result = notification::Entity::update_many()
      .col_expr(notification::Column::IsRead, true.into())
      .filter(notification::Column::UserId.eq(user_id))
      .filter(notification::Column::IsRead.eq(false))
      .exec(self.db)
      .await?;
    Ok(result.rows_affected)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::UserRole, sv::test_utils::test_db};

  #[tokio::test]
  async fn test_read_tracking() {
    let db = test_db::setup().await;
    let alice = test_db::user(&db, "a@mail.com", UserRole::User, 0).await;
    let bob = test_db::user(&db, "b@mail.com", UserRole::User, 0).await;
    let sv = Notification::new(&db);

    let first = Notification::notify(&db, alice.id, "Hi", "one").await.unwrap();
    Notification::notify(&db, alice.id, "Hi", "two").await.unwrap();
    Notification::notify(&db, bob.id, "Hi", "three").await.unwrap();

    assert_eq!(sv.unread_count(alice.id).await.unwrap(), 2);

    // Bob cannot touch Alice's notifications
    assert!(!sv.mark_read(bob.id, first.id).await.unwrap());
    assert!(sv.mark_read(alice.id, first.id).await.unwrap());
    assert_eq!(sv.unread_count(alice.id).await.unwrap(), 1);

    let unread = sv.list(alice.id, true, None, None).await.unwrap();
    assert_eq!(unread.items.len(), 1);
    assert_eq!(unread.items[0].body, "two");

    assert_eq!(sv.mark_all_read(alice.id).await.unwrap(), 1);
    assert_eq!(sv.unread_count(alice.id).await.unwrap(), 0);
    assert_eq!(sv.unread_count(bob.id).await.unwrap(), 1);
  }
}
