mod command;

use std::sync::Arc;

use command::Command;
use teloxide::{
  Bot,
  dispatching::{Dispatcher, HandlerExt, UpdateFilterExt},
  prelude::*,
  types::{BotCommandScope, ChatId, Message, ParseMode, Update},
  utils::command::BotCommands,
};

use crate::{prelude::*, state::AppState};

/// Admin console over Telegram. Idle when no bot token is configured.
pub struct Plugin;

#[async_trait::async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let Some(bot) = app.bot.clone() else {
      info!("TELOXIDE_TOKEN not set, Telegram admin bot disabled");
      return Ok(());
    };

    run_bot(app, bot).await;
    Ok(())
  }
}

/// Command hints are only shown in admin chats.
async fn setup_commands(bot: &Bot, admins: &HashSet<i64>) {
  for &admin_id in admins {
    if let Err(e) = bot
      .set_my_commands(Command::bot_commands())
      .scope(BotCommandScope::Chat { chat_id: ChatId(admin_id).into() })
      .await
    {
      warn!("Failed to set admin commands for {}: {}", admin_id, e);
    }
  }

  info!("Command hints configured for {} admin chat(s)", admins.len());
}

async fn run_bot(app: Arc<AppState>, bot: Bot) {
  info!("Starting Telegram bot...");

  setup_commands(&bot, &app.admins).await;

  let handler = Update::filter_message().filter_command::<Command>().endpoint(
    move |bot: Bot, msg: Message, cmd: Command| {
      let app = app.clone();
      let user_id =
        msg.from.as_ref().map_or(msg.chat.id.0, |user| user.id.0 as i64);
      let bot = ReplyBot::new(bot, user_id, msg.chat.id);
      command::handle(app, bot, cmd)
    },
  );

  Dispatcher::builder(bot, handler).build().dispatch().await;
}

#[derive(Debug, Clone)]
struct ReplyBot {
  inner: Bot,
  pub user_id: i64,
  pub chat_id: ChatId,
}

impl ReplyBot {
  pub fn new(inner: Bot, user_id: i64, chat_id: ChatId) -> Self {
    Self { inner, user_id, chat_id }
  }

  async fn reply_html(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<Message> {
    self
      .inner
      .send_message(self.chat_id, text.into())
      .parse_mode(ParseMode::Html)
      .await
  }

  /// Send a potentially long message split on line boundaries.
  async fn reply_html_chunked(
    &self,
    text: impl Into<String>,
  ) -> ResponseResult<()> {
    for chunk in utils::chunk_message(&text.into(), 0) {
      self
        .inner
        .send_message(self.chat_id, chunk)
        .parse_mode(ParseMode::Html)
        .await?;
    }
    Ok(())
  }
}
