use rand::{Rng, distributions::Alphanumeric};

use crate::prelude::*;

/// Telegram rejects messages longer than this.
const MESSAGE_LIMIT: usize = 4096;

pub fn now() -> DateTime {
  Utc::now().naive_utc()
}

pub fn format_date(date: DateTime) -> String {
  date.format("%d.%m.%Y %H:%M").to_string()
}

/// Format an amount stored in cents.
pub fn format_money(cents: i64) -> String {
  let sign = if cents < 0 { "-" } else { "" };
  let cents = cents.unsigned_abs();
  format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

/// Parse a user-entered decimal amount ("10", "10.5", "10.55") into cents.
pub fn parse_money(input: &str) -> Option<i64> {
  let input = input.trim().trim_start_matches('$');
  let (whole, frac) = match input.split_once('.') {
    Some((whole, frac)) => (whole, frac),
    None => (input, ""),
  };

  if (whole.is_empty() && frac.is_empty()) || frac.len() > 2 {
    return None;
  }

  let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
  let frac: i64 = match frac.len() {
    0 => 0,
    1 => frac.parse::<i64>().ok()? * 10,
    _ => frac.parse().ok()?,
  };

  whole.checked_mul(100)?.checked_add(frac)
}

pub fn referral_code() -> String {
  rand::thread_rng()
    .sample_iter(&Alphanumeric)
    .take(8)
    .map(|c| (c as char).to_ascii_uppercase())
    .collect()
}

/// Split a long HTML message on line boundaries.
/// `limit == 0` means the Telegram default.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
  let limit = if limit == 0 { MESSAGE_LIMIT } else { limit };
  let mut chunks = Vec::new();
  let mut current = String::new();

  for line in text.split_inclusive('\n') {
    if !current.is_empty() && current.len() + line.len() > limit {
      chunks.push(std::mem::take(&mut current));
    }

    if line.len() > limit {
      let mut rest = line;
      while rest.len() > limit {
        let mut cut = limit;
        while !rest.is_char_boundary(cut) {
          cut -= 1;
        }
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
      }
      current.push_str(rest);
    } else {
      current.push_str(line);
    }
  }

  if !current.is_empty() || chunks.is_empty() {
    chunks.push(current);
  }

  chunks
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn money_formatting() {
    assert_eq!(format_money(0), "$0.00");
    assert_eq!(format_money(2050), "$20.50");
    assert_eq!(format_money(-5), "-$0.05");
  }

  #[test]
  fn money_parsing() {
    assert_eq!(parse_money("10"), Some(1000));
    assert_eq!(parse_money("10.5"), Some(1050));
    assert_eq!(parse_money("$0.07"), Some(7));
    assert_eq!(parse_money("1.234"), None);
    assert_eq!(parse_money("abc"), None);
    assert_eq!(parse_money("."), None);
  }

  #[test]
  fn referral_codes_are_upper_alnum() {
    let code = referral_code();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
  }

  #[test]
  fn chunks_respect_limit() {
    let text = "line one\nline two\nline three\n";
    let chunks = chunk_message(text, 12);
    assert!(chunks.iter().all(|c| c.len() <= 12));
    assert_eq!(chunks.concat(), text);

    assert_eq!(chunk_message("", 0), vec![String::new()]);
  }
}
