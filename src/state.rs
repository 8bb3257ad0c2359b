use futures::future;
use teloxide::{prelude::*, types::ParseMode};

use crate::{
  config::Config,
  prelude::*,
  sv::{self, gateway::Gateway, prompt::PromptCache},
};

pub struct AppState {
  pub db: DatabaseConnection,
  /// Present when the Telegram admin bot is configured.
  pub bot: Option<Bot>,
  pub admins: HashSet<i64>,
  pub config: Config,
  pub gateway: Arc<dyn Gateway>,
  pub prompts: PromptCache,
}

/// Request-scoped view of every service over the shared pool.
pub struct Services<'a> {
  pub audit: sv::Audit<'a>,
  pub auth: sv::Auth<'a>,
  pub balance: sv::Balance<'a>,
  pub broadcast: sv::Broadcast<'a>,
  pub chat: sv::Chat<'a>,
  pub license: sv::License<'a>,
  pub notification: sv::Notification<'a>,
  pub payment: sv::Payment<'a>,
  pub plan: sv::Plan<'a>,
  pub prediction: sv::Prediction<'a>,
  pub prompt: sv::Prompt<'a>,
  pub referral: sv::Referral<'a>,
  pub stats: sv::Stats<'a>,
  pub user: sv::User<'a>,
}

impl AppState {
  pub async fn new(config: Config) -> anyhow::Result<Self> {
    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;
    info!("Database ready at {}", config.database_url);

    let gateway = sv::gateway::from_config(&config.ai)?;
    let bot = config.telegram_token.as_deref().map(Bot::new);

    Ok(Self::with_parts(db, bot, config, gateway))
  }

  pub fn with_parts(
    db: DatabaseConnection,
    bot: Option<Bot>,
    config: Config,
    gateway: Arc<dyn Gateway>,
  ) -> Self {
    Self {
      db,
      bot,
      admins: config.admins.clone(),
      config,
      gateway,
      prompts: PromptCache::new(),
    }
  }

  pub fn sv(&self) -> Services<'_> {
    let db = &self.db;
    let gateway = self.gateway.as_ref();

    Services {
      audit: sv::Audit::new(db),
      auth: sv::Auth::new(db, &self.config),
      balance: sv::Balance::new(db),
      broadcast: sv::Broadcast::new(db),
      chat: sv::Chat::new(db, gateway, &self.prompts, self.config.chat_history),
      license: sv::License::new(db),
      notification: sv::Notification::new(db),
      payment: sv::Payment::new(db),
      plan: sv::Plan::new(db),
      prediction: sv::Prediction::new(
        db,
        gateway,
        &self.prompts,
        self.config.prediction_mode,
      ),
      prompt: sv::Prompt::new(db, &self.prompts),
      referral: sv::Referral::new(db),
      stats: sv::Stats::new(db),
      user: sv::User::new(db),
    }
  }

  /// Best-effort HTML message to every admin chat.
  pub async fn notify_admins(&self, text: &str) {
    let Some(bot) = &self.bot else {
      debug!("No bot configured, dropping admin notice");
      return;
    };

    let sends = self.admins.iter().map(|&admin| async move {
      for chunk in utils::chunk_message(text, 0) {
        if let Err(err) = bot
          .send_message(ChatId(admin), chunk)
          .parse_mode(ParseMode::Html)
          .await
        {
          warn!("Failed to notify admin {}: {}", admin, err);
          break;
        }
      }
    });

    future::join_all(sends).await;
  }
}
