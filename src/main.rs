mod config;
mod entity;
mod error;
mod plugins;
mod prelude;
mod state;
mod sv;
mod utils;

use std::sync::Arc;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{
  config::Config,
  plugins::{App, cron, server, telegram},
  prelude::*,
  state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "predictpro=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let config = Config::from_env()?;

  info!("Starting PredictPro v{}", env!("CARGO_PKG_VERSION"));
  info!(
    "Prediction mode: {:?}, AI model: {}",
    config.prediction_mode, config.ai.model
  );

  let app = Arc::new(AppState::new(config).await?);

  App::new()
    .register(server::Plugin)
    .register(telegram::Plugin)
    .register(cron::PaymentsGc)
    .register(cron::Digest)
    .run(app)
    .await;

  Ok(())
}
