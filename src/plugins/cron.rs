use std::sync::Arc;

use async_trait::async_trait;
use tokio::time;

use crate::{plugins::Plugin, prelude::*, state::AppState};

/// Fails pending payments older than `PENDING_TTL`.
pub struct PaymentsGc;

#[async_trait]
impl Plugin for PaymentsGc {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let ttl = app.config.pending_ttl;
    if app.config.gc_interval.is_zero() {
      info!("Payments GC disabled via config (0 interval)");
      return Ok(());
    }

    info!(
      "Payments GC started (interval: {}, ttl: {})",
      humantime::format_duration(app.config.gc_interval),
      humantime::format_duration(ttl)
    );

    let mut interval = time::interval(app.config.gc_interval);
    loop {
      interval.tick().await;

      match app.sv().payment.expire_stale(ttl).await {
        Ok(0) => {}
        Ok(count) => {
          info!("Expired {} stale payment(s)", count);
          app
            .notify_admins(&format!(
              "⌛ {count} pending payment(s) expired after {}",
              humantime::format_duration(ttl)
            ))
            .await;
        }
        Err(err) => error!("Payments GC failed: {}", err),
      }
    }
  }
}

/// Time left until the next UTC midnight.
fn until_midnight(now: chrono::DateTime<Utc>) -> Duration {
  let next = now
    .date_naive()
    .succ_opt()
    .and_then(|day| day.and_hms_opt(0, 0, 0));

  next
    .and_then(|next| (next - now.naive_utc()).to_std().ok())
    .unwrap_or(Duration::from_secs(3600))
}

/// Daily dashboard sent to admin chats.
pub struct Digest;

#[async_trait]
impl Plugin for Digest {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    if app.bot.is_none() || app.admins.is_empty() {
      info!("No admin chats configured, daily digest disabled");
      return Ok(());
    }

    loop {
      let sleep = until_midnight(Utc::now());
      info!("Daily digest scheduled in {} minutes", sleep.as_secs() / 60);
      time::sleep(sleep).await;

      match app.sv().stats.dashboard().await {
        Ok(stats) => app.notify_admins(&stats.to_html()).await,
        Err(err) => error!("Failed to build daily digest: {}", err),
      }
    }
  }
}
