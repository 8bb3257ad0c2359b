pub mod audit;
pub mod auth;
pub mod balance;
pub mod broadcast;
pub mod chat;
pub mod gateway;
pub mod license;
pub mod notification;
pub mod payment;
pub mod plan;
pub mod prediction;
pub mod predictor;
pub mod prompt;
pub mod referral;
pub mod stats;
#[cfg(test)]
pub mod test_utils;
pub mod user;

use serde::Serialize;

pub use audit::{Actor, Audit};
pub use auth::Auth;
pub use balance::Balance;
pub use broadcast::Broadcast;
pub use chat::Chat;
pub use license::License;
pub use notification::Notification;
pub use payment::Payment;
pub use plan::Plan;
pub use prediction::Prediction;
pub use prompt::Prompt;
pub use referral::Referral;
pub use stats::Stats;
pub use user::User;

const DEFAULT_PAGE: u64 = 20;
const MAX_PAGE: u64 = 100;

pub fn page_limit(limit: Option<u64>) -> u64 {
  limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}

/// Keyset page ordered by descending id.
#[derive(Debug, Serialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub next_cursor: Option<i64>,
}

impl<T> Page<T> {
  /// `items` are expected to be fetched with `limit + 1` rows so the
  /// presence of a next page can be detected.
  pub fn new(mut items: Vec<T>, limit: u64, cursor: impl Fn(&T) -> i64) -> Self {
    let next_cursor = if items.len() as u64 > limit {
      items.truncate(limit as usize);
      items.last().map(cursor)
    } else {
      None
    };

    Self { items, next_cursor }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn page_detects_next_cursor() {
    let page = Page::new(vec![9, 8, 7], 2, |n| *n as i64);
    assert_eq!(page.items, vec![9, 8]);
    assert_eq!(page.next_cursor, Some(8));

    let page = Page::new(vec![3], 2, |n| *n as i64);
    assert_eq!(page.next_cursor, None);
  }

  #[test]
  fn limits_are_clamped() {
    assert_eq!(page_limit(None), 20);
    assert_eq!(page_limit(Some(0)), 1);
    assert_eq!(page_limit(Some(1000)), 100);
  }
}
