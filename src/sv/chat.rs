use sea_orm::sea_query::Expr;
use serde::Serialize;

use super::{
  Actor, Audit, Notification,
  gateway::{GenerateRequest, Gateway, Role, Turn},
  license::usable_query,
  prompt::{self, Prompt, PromptCache},
};
use crate::{
  entity::{ChatSender, Game, chat_message, user},
  prelude::*,
};

const MAX_MESSAGE: usize = 2000;
const TEMPERATURE: f32 = 0.4;

pub const HANDOFF_REPLY: &str = "I can't answer that right now. A member of \
  our support team has been notified and will reply here shortly.";

#[derive(Debug, Serialize)]
pub struct ChatReply {
  pub message: chat_message::Model,
  /// The assistant could not answer and staff should follow up.
  pub handed_off: bool,
}

pub struct Chat<'a> {
  db: &'a DatabaseConnection,
  gateway: &'a dyn Gateway,
  prompts: &'a PromptCache,
  history: u64,
}

fn clean(text: &str) -> Result<&str> {
  let text = text.trim();
  if text.is_empty() {
    return Err(Error::InvalidArgs("Message cannot be empty".into()));
  }
  if text.chars().count() > MAX_MESSAGE {
    return Err(Error::InvalidArgs(format!(
      "Message is longer than {MAX_MESSAGE} characters"
    )));
  }
  Ok(text)
}

async fn insert<C: ConnectionTrait>(
  conn: &C,
  user_id: i64,
  sender: ChatSender,
  content: &str,
) -> Result<chat_message::Model> {
  Ok(
    chat_message::ActiveModel {
      id: NotSet,
      user_id: Set(user_id),
      sender: Set(sender),
      content: Set(content.to_string()),
      created_at: Set(utils::now()),
    }
    .insert(conn)
    .await?,
  )
}

impl<'a> Chat<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    gateway: &'a dyn Gateway,
    prompts: &'a PromptCache,
    history: u64,
  ) -> Self {
    Self { db, gateway, prompts, history }
  }

  async fn license_summary(&self, user_id: i64) -> Result<String> {
    let mut parts = Vec::new();
    for game in Game::ALL {
      let rounds: i64 = usable_query(user_id, game)
        .all(self.db)
        .await?
        .iter()
        .map(|l| l.rounds_remaining as i64)
        .sum();
      if rounds > 0 {
        parts.push(format!("{game}: {rounds} rounds"));
      }
    }

    Ok(if parts.is_empty() { "none".into() } else { parts.join(", ") })
  }

  async fn answer(
    &self,
    user: &user::Model,
    text: &str,
    earlier: Vec<chat_message::Model>,
  ) -> Result<String> {
    let system = Prompt::new(self.db, self.prompts).get(prompt::CHAT_SYSTEM).await?;
    let vars = HashMap::from([
      ("name", user.display_name.clone()),
      ("licenses", self.license_summary(user.id).await?),
    ]);

    let history = earlier
      .into_iter()
      .map(|m| Turn {
        role: match m.sender {
          ChatSender::User => Role::User,
          ChatSender::Bot | ChatSender::Staff => Role::Model,
        },
        text: m.content,
      })
      .collect();

    self
      .gateway
      .generate(GenerateRequest {
        system: Some(prompt::render(&system.template, &vars)?),
        prompt: text.to_string(),
        history,
        schema: None,
        temperature: TEMPERATURE,
        model: system.model,
      })
      .await
  }

  pub async fn send(&self, user_id: i64, text: &str) -> Result<ChatReply> {
    let text = clean(text)?;
    let user = user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;
    if user.is_suspended {
      return Err(Error::Suspended);
    }

    let mut earlier = self.history(user_id, self.history).await?;
    // Keep the conversation starting with a user turn
    while earlier.first().is_some_and(|m| m.sender != ChatSender::User) {
      earlier.remove(0);
    }

    insert(self.db, user_id, ChatSender::User, text).await?;

    let (reply, handed_off) = match self.answer(&user, text, earlier).await {
      Ok(reply) => (reply.trim().to_string(), false),
      Err(err) => {
        warn!("Support bot failed for user {}: {}", user_id, err);
        (HANDOFF_REPLY.to_string(), true)
      }
    };

    let message = insert(self.db, user_id, ChatSender::Bot, &reply).await?;
    Ok(ChatReply { message, handed_off })
  }

  /// Most recent `limit` messages, oldest first.
  pub async fn history(
    &self,
    user_id: i64,
    limit: u64,
  ) -> Result<Vec<chat_message::Model>> {
    let mut messages = chat_message::Entity::find()
      .filter(chat_message::Column::UserId.eq(user_id))
      .order_by_desc(chat_message::Column::Id)
      .limit(limit)
      .all(self.db)
      .await?;
    messages.reverse();
    Ok(messages)
  }

  pub async fn staff_reply(
    &self,
    actor: Actor,
    user_id: i64,
    text: &str,
  ) -> Result<chat_message::Model> {
    actor.require_staff()?;
    let text = clean(text)?;

    let txn = self.db.begin().await?;
    user::Entity::find_by_id(user_id)
      .one(&txn)
      .await?
      .ok_or(Error::UserNotFound)?;

    let message = insert(&txn, user_id, ChatSender::Staff, text).await?;

    Audit::record(
      &txn,
      actor,
      "chat.reply",
      Some(format!("user:{user_id}")),
      None,
    )
    .await?;
    Notification::notify(
      &txn,
      user_id,
      "Support replied",
      "Our team answered your message in the support chat.",
    )
    .await?;

    txn.commit().await?;
    Ok(message)
  }

  /// Latest message of each conversation, most recently active first.
  pub async fn threads(&self, limit: u64) -> Result<Vec<chat_message::Model>> {
    let ids: Vec<i32> = chat_message::Entity::find()
      .select_only()
      .column_as(Expr::col(chat_message::Column::Id).max(), "id")
      .group_by(chat_message::Column::UserId)
      .order_by_desc(Expr::col(chat_message::Column::Id).max())
      .limit(limit)
      .into_tuple()
      .all(self.db)
      .await?;

    Ok(
      chat_message::Entity::find()
        .filter(chat_message::Column::Id.is_in(ids))
        .order_by_desc(chat_message::Column::Id)
        .all(self.db)
        .await?,
    )
  }
}
