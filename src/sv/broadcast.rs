use serde::{Deserialize, Serialize};

use super::{Actor, Audit, Page, page_limit};
use crate::{
  entity::{Game, UserRole, broadcast, license, notification, user},
  prelude::*,
};

/// Who receives a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceFilter {
  pub role: Option<UserRole>,
  /// Only holders of a usable license for this game.
  pub game: Option<Game>,
  #[serde(default)]
  pub include_suspended: bool,
}

pub struct Broadcast<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Broadcast<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  async fn audience<C: ConnectionTrait>(
    conn: &C,
    filter: &AudienceFilter,
  ) -> Result<Vec<i64>> {
    let mut query = user::Entity::find();

    if let Some(role) = filter.role {
      query = query.filter(user::Column::Role.eq(role));
    }
    if !filter.include_suspended {
      query = query.filter(user::Column::IsSuspended.eq(false));
    }

    let mut ids: Vec<i64> = query
      .select_only()
      .column(user::Column::Id)
      .into_tuple()
      .all(conn)
      .await?;

    if let Some(game) = filter.game {
      let holders: HashSet<i64> = license::Entity::find()
        .select_only()
        .column(license::Column::UserId)
        .filter(license::Column::Game.eq(game))
        .filter(license::Column::PaymentVerified.eq(true))
        .filter(license::Column::IsActive.eq(true))
        .filter(license::Column::RoundsRemaining.gt(0))
        .into_tuple::<i64>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
      ids.retain(|id| holders.contains(id));
    }

    Ok(ids)
  }

  pub async fn preview(&self, filter: &AudienceFilter) -> Result<usize> {
    Ok(Self::audience(self.db, filter).await?.len())
  }

  pub async fn send(
    &self,
    actor: Actor,
    title: &str,
    body: &str,
    filter: AudienceFilter,
  ) -> Result<broadcast::Model> {
    actor.require_admin()?;

    let (title, body) = (title.trim(), body.trim());
    if title.is_empty() || body.is_empty() {
      return Err(Error::InvalidArgs("Title and message are required".into()));
    }

    let txn = self.db.begin().await?;
    let recipients = Self::audience(&txn, &filter).await?;
    let now = utils::now();

    let audience = json::to_value(&filter)
      .map_err(|e| Error::Internal(format!("encode audience: {e}")))?;

    let broadcast = broadcast::ActiveModel {
      id: NotSet,
      author: Set(actor.label()),
      title: Set(title.to_string()),
      body: Set(body.to_string()),
      audience: Set(audience.clone()),
      recipients: Set(recipients.len() as i32),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    // SQLite caps bound parameters per statement
    for chunk in recipients.chunks(500) {
      notification::Entity::insert_many(chunk.iter().map(|&user_id| {
        notification::ActiveModel {
          id: NotSet,
          user_id: Set(user_id),
          broadcast_id: Set(Some(broadcast.id)),
          title: Set(title.to_string()),
          body: Set(body.to_string()),
          is_read: Set(false),
          created_at: Set(now),
        }
      }))
      .exec(&txn)
      .await?;
    }

    Audit::record(
      &txn,
      actor,
      "broadcast.send",
      Some(format!("broadcast:{}", broadcast.id)),
      Some(json::json!({ "audience": audience, "recipients": recipients.len() })),
    )
    .await?;

    txn.commit().await?;
    info!(
      "Broadcast {} \"{}\" sent to {} users by {}",
      broadcast.id,
      title,
      recipients.len(),
      actor.label()
    );
    Ok(broadcast)
  }

  pub async fn list(
    &self,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<broadcast::Model>> {
    let limit = page_limit(limit);
    let mut query = broadcast::Entity::find();

    if let Some(cursor) = cursor {
      query = query.filter(broadcast::Column::Id.lt(cursor));
    }

    let items = query
      .order_by_desc(broadcast::Column::Id)
      .limit(limit + 1)
      .all(self.db)
      .await?;

    Ok(Page::new(items, limit, |b| b.id as i64))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{License, Notification, test_utils::test_db};

  #[tokio::test]
  async fn test_broadcast_to_filtered_audience() {
    let db = test_db::setup().await;
    let a = test_db::user(&db, "a@mail.com", UserRole::User, 0).await;
    let b = test_db::user(&db, "b@mail.com", UserRole::User, 0).await;
    let staff = test_db::user(&db, "s@mail.com", UserRole::Assistant, 0).await;
    let suspended = test_db::user(&db, "x@mail.com", UserRole::User, 0).await;
    user::ActiveModel { is_suspended: Set(true), ..suspended.clone().into() }
      .update(&db)
      .await
      .unwrap();
    License::new(&db).grant(Actor::System, a.id, Game::Mines, 3).await.unwrap();

    let sv = Broadcast::new(&db);

    let all = sv
      .send(Actor::System, "News", "Hello all", AudienceFilter::default())
      .await
      .unwrap();
    assert_eq!(all.recipients, 3);

    let miners = sv
      .send(Actor::System, "Mines", "Tips", AudienceFilter {
        game: Some(Game::Mines),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(miners.recipients, 1);

    let staff_only = AudienceFilter {
      role: Some(UserRole::Assistant),
      ..Default::default()
    };
    assert_eq!(sv.preview(&staff_only).await.unwrap(), 1);

    let notifications = Notification::new(&db);
    // grant notification + two broadcasts
    assert_eq!(notifications.unread_count(a.id).await.unwrap(), 3);
    assert_eq!(notifications.unread_count(b.id).await.unwrap(), 1);
    assert_eq!(notifications.unread_count(staff.id).await.unwrap(), 1);
    assert_eq!(notifications.unread_count(suspended.id).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_empty_audience_and_permissions() {
    let db = test_db::setup().await;
    let user = test_db::user(&db, "a@mail.com", UserRole::User, 0).await;
    let sv = Broadcast::new(&db);

    let nobody = sv
      .send(Actor::System, "Hi", "Nobody", AudienceFilter {
        game: Some(Game::Roulette),
        ..Default::default()
      })
      .await
      .unwrap();
    assert_eq!(nobody.recipients, 0);

    assert!(matches!(
      sv.send(Actor::user(&user), "Hi", "Body", AudienceFilter::default()).await,
      Err(Error::Forbidden)
    ));
    assert_eq!(sv.list(None, None).await.unwrap().items.len(), 1);
  }
}
