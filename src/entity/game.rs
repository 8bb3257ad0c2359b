use std::{fmt, str::FromStr};

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum Game {
  #[sea_orm(string_value = "aviator")]
  Aviator,
  #[sea_orm(string_value = "mines")]
  Mines,
  #[sea_orm(string_value = "dice")]
  Dice,
  #[sea_orm(string_value = "roulette")]
  Roulette,
}

impl Game {
  pub const ALL: [Game; 4] =
    [Game::Aviator, Game::Mines, Game::Dice, Game::Roulette];

  pub fn as_str(&self) -> &'static str {
    match self {
      Game::Aviator => "aviator",
      Game::Mines => "mines",
      Game::Dice => "dice",
      Game::Roulette => "roulette",
    }
  }
}

impl fmt::Display for Game {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Game {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Game::ALL
      .into_iter()
      .find(|game| game.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| format!("unknown game `{s}`"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_case_insensitive() {
    assert_eq!("Mines".parse::<Game>().unwrap(), Game::Mines);
    assert_eq!(" aviator ".parse::<Game>().unwrap(), Game::Aviator);
    assert!("blackjack".parse::<Game>().is_err());
  }
}
