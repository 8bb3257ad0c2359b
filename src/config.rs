use std::{collections::HashSet, env, str::FromStr, time::Duration};

use anyhow::{Context, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionMode {
  /// Ask the AI gateway, fall back to the local generator on failure.
  Ai,
  Local,
}

impl FromStr for PredictionMode {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> anyhow::Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "ai" => Ok(PredictionMode::Ai),
      "local" => Ok(PredictionMode::Local),
      other => bail!("unknown prediction mode `{other}` (expected ai|local)"),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
  pub api_key: Option<String>,
  pub model: String,
  pub base_url: String,
  pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
  pub database_url: String,
  pub port: u16,
  pub secret: String,
  pub token_ttl: Duration,
  pub telegram_token: Option<String>,
  pub admins: HashSet<i64>,
  pub ai: AiConfig,
  pub prediction_mode: PredictionMode,
  pub pending_ttl: Duration,
  pub gc_interval: Duration,
  pub default_commission_rate: i32,
  pub chat_history: u64,
  pub superadmin_email: Option<String>,
}

const MIN_SECRET_LEN: usize = 32;

fn var(name: &str) -> Option<String> {
  env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn duration(name: &str, default: &str) -> anyhow::Result<Duration> {
  let raw = var(name).unwrap_or_else(|| default.to_string());
  humantime::parse_duration(&raw)
    .with_context(|| format!("{name}: invalid duration `{raw}`"))
}

fn parse<T: FromStr>(name: &str, default: T) -> anyhow::Result<T>
where
  T::Err: std::fmt::Display,
{
  match var(name) {
    Some(raw) => raw
      .parse()
      .map_err(|err| anyhow::anyhow!("{name}: invalid value `{raw}`: {err}")),
    None => Ok(default),
  }
}

impl Config {
  pub fn from_env() -> anyhow::Result<Self> {
    let secret = var("SERVER_SECRET").context("SERVER_SECRET not set")?;
    if secret.len() < MIN_SECRET_LEN {
      bail!("SERVER_SECRET must be at least {MIN_SECRET_LEN} bytes");
    }

    let admins = var("ADMIN_IDS")
      .unwrap_or_default()
      .split(',')
      .filter(|s| !s.trim().is_empty())
      .map(|id| {
        id.trim().parse().with_context(|| format!("invalid admin id `{id}`"))
      })
      .collect::<anyhow::Result<HashSet<i64>>>()?;

    let ai = AiConfig {
      api_key: var("AI_API_KEY"),
      model: var("AI_MODEL").unwrap_or_else(|| "gemini-1.5-flash".into()),
      base_url: var("AI_BASE_URL").unwrap_or_else(|| {
        "https://generativelanguage.googleapis.com/v1beta".into()
      }),
      timeout: duration("AI_TIMEOUT", "30s")?,
    };

    let default_mode = if ai.api_key.is_some() {
      PredictionMode::Ai
    } else {
      PredictionMode::Local
    };

    let default_commission_rate = parse("DEFAULT_COMMISSION_RATE", 10)?;
    if !(0..=100).contains(&default_commission_rate) {
      bail!("DEFAULT_COMMISSION_RATE must be within 0..=100");
    }

    Ok(Self {
      database_url: var("DATABASE_URL")
        .unwrap_or_else(|| "sqlite:predictpro.db?mode=rwc".into()),
      port: parse("PORT", 3000)?,
      secret,
      token_ttl: duration("TOKEN_TTL", "7d")?,
      telegram_token: var("TELOXIDE_TOKEN"),
      admins,
      ai,
      prediction_mode: parse("PREDICTION_MODE", default_mode)?,
      pending_ttl: duration("PENDING_TTL", "48h")?,
      gc_interval: duration("GC_INTERVAL", "10m")?,
      default_commission_rate,
      chat_history: parse("CHAT_HISTORY", 20)?,
      superadmin_email: var("SUPERADMIN_EMAIL").map(|e| e.to_lowercase()),
    })
  }

  #[cfg(test)]
  pub fn for_tests() -> Self {
    Self {
      database_url: "sqlite::memory:".into(),
      port: 0,
      secret: "test-secret-that-is-long-enough-for-hs256".into(),
      token_ttl: Duration::from_secs(3600),
      telegram_token: None,
      admins: HashSet::new(),
      ai: AiConfig {
        api_key: None,
        model: "test-model".into(),
        base_url: "http://localhost".into(),
        timeout: Duration::from_secs(1),
      },
      prediction_mode: PredictionMode::Local,
      pending_ttl: Duration::from_secs(48 * 3600),
      gc_interval: Duration::from_secs(600),
      default_commission_rate: 10,
      chat_history: 20,
      superadmin_email: Some("root@predictpro.test".into()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_prediction_mode() {
    assert_eq!("AI".parse::<PredictionMode>().unwrap(), PredictionMode::Ai);
    assert_eq!(
      "local".parse::<PredictionMode>().unwrap(),
      PredictionMode::Local
    );
    assert!("remote".parse::<PredictionMode>().is_err());
  }
}
