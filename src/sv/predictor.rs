//! Game parameters, prediction outputs and the offline generator used
//! when the AI gateway is off or misbehaves.

use rand::{Rng, SeedableRng, rngs::StdRng, seq::index};
use serde::{Deserialize, Serialize};

use crate::{entity::Game, prelude::*};

pub const MAX_HISTORY: usize = 50;
pub const TILES: u8 = 25;
pub const MAX_PICKS: u8 = 10;

const RED: [u8; 18] =
  [1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
  Low,
  Medium,
  High,
}

impl Risk {
  /// Chance to win, in percent, that a dice call of this risk aims for.
  fn win_chance(&self) -> u8 {
    match self {
      Risk::Low => 70,
      Risk::Medium => 50,
      Risk::High => 25,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
  Red,
  Black,
  Green,
}

impl Color {
  pub fn of(number: u8) -> Self {
    match number {
      0 => Color::Green,
      n if RED.contains(&n) => Color::Red,
      _ => Color::Black,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum PredictionParams {
  Aviator {
    #[serde(default)]
    history: Vec<f64>,
  },
  Mines {
    mines: u8,
    picks: u8,
  },
  Dice {
    risk: Risk,
  },
  Roulette {
    #[serde(default)]
    history: Vec<u8>,
  },
}

impl PredictionParams {
  pub fn game(&self) -> Game {
    match self {
      PredictionParams::Aviator { .. } => Game::Aviator,
      PredictionParams::Mines { .. } => Game::Mines,
      PredictionParams::Dice { .. } => Game::Dice,
      PredictionParams::Roulette { .. } => Game::Roulette,
    }
  }

  pub fn validate(&self) -> Result<()> {
    let bad = |msg: &str| Err(Error::InvalidArgs(msg.into()));

    match self {
      PredictionParams::Aviator { history } => {
        if history.len() > MAX_HISTORY {
          return bad("At most 50 past multipliers are accepted");
        }
        if history.iter().any(|m| !m.is_finite() || *m < 1.0) {
          return bad("Multipliers must be at least 1.00");
        }
      }
      PredictionParams::Mines { mines, picks } => {
        if !(1..TILES).contains(mines) {
          return bad("Mines must be between 1 and 24");
        }
        if *picks == 0 || *picks > MAX_PICKS.min(TILES - mines) {
          return bad("Too many tiles requested for this board");
        }
      }
      PredictionParams::Dice { .. } => {}
      PredictionParams::Roulette { history } => {
        if history.len() > MAX_HISTORY {
          return bad("At most 50 past numbers are accepted");
        }
        if history.iter().any(|n| *n > 36) {
          return bad("Roulette numbers go from 0 to 36");
        }
      }
    }

    Ok(())
  }

  /// Key/value pairs exposed to prompt templates.
  pub fn prompt_vars(&self) -> HashMap<&'static str, String> {
    let mut vars = HashMap::new();
    vars.insert("game", self.game().to_string());

    match self {
      PredictionParams::Aviator { history } => {
        let list = history.iter().map(|m| format!("{m:.2}")).collect::<Vec<_>>();
        vars.insert("history", join_or_none(&list));
      }
      PredictionParams::Mines { mines, picks } => {
        vars.insert("mines", mines.to_string());
        vars.insert("picks", picks.to_string());
      }
      PredictionParams::Dice { risk } => {
        let risk = match risk {
          Risk::Low => "low",
          Risk::Medium => "medium",
          Risk::High => "high",
        };
        vars.insert("risk", risk.to_string());
      }
      PredictionParams::Roulette { history } => {
        let list = history.iter().map(u8::to_string).collect::<Vec<_>>();
        vars.insert("history", join_or_none(&list));
      }
    }

    vars
  }
}

fn join_or_none(items: &[String]) -> String {
  if items.is_empty() { "none".into() } else { items.join(", ") }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum PredictionOutput {
  Aviator { cashout: f64, confidence: u8 },
  Mines { safe_tiles: Vec<u8> },
  Dice { target: u8, over: bool, confidence: u8 },
  Roulette { numbers: Vec<u8>, color: Color },
}

impl PredictionOutput {
  pub fn game(&self) -> Game {
    match self {
      PredictionOutput::Aviator { .. } => Game::Aviator,
      PredictionOutput::Mines { .. } => Game::Mines,
      PredictionOutput::Dice { .. } => Game::Dice,
      PredictionOutput::Roulette { .. } => Game::Roulette,
    }
  }

  /// Parse a bare JSON object produced for `game` (without the tag).
  pub fn parse(game: Game, text: &str) -> Result<Self> {
    let text = text
      .trim()
      .trim_start_matches("```json")
      .trim_start_matches("```")
      .trim_end_matches("```")
      .trim();

    let mut value: json::Value = json::from_str(text)
      .map_err(|e| Error::Gateway(format!("malformed JSON: {e}")))?;
    let object = value
      .as_object_mut()
      .ok_or_else(|| Error::Gateway("expected a JSON object".into()))?;
    object.insert("game".into(), json::Value::String(game.to_string()));

    json::from_value(value)
      .map_err(|e| Error::Gateway(format!("unexpected shape: {e}")))
  }

  pub fn validate(&self, params: &PredictionParams) -> Result<()> {
    let bad = |msg: String| Err(Error::Gateway(msg));

    if self.game() != params.game() {
      return bad(format!("answered {} for {}", self.game(), params.game()));
    }

    match (self, params) {
      (PredictionOutput::Aviator { cashout, confidence }, _) => {
        if !(1.01..=100.0).contains(cashout) {
          return bad(format!("cashout {cashout} out of range"));
        }
        if *confidence > 100 {
          return bad(format!("confidence {confidence} out of range"));
        }
      }
      (
        PredictionOutput::Mines { safe_tiles },
        PredictionParams::Mines { picks, .. },
      ) => {
        if safe_tiles.len() != *picks as usize {
          return bad(format!("{} tiles for {picks} picks", safe_tiles.len()));
        }
        if safe_tiles.iter().any(|t| *t >= TILES) {
          return bad("tile outside the board".into());
        }
        if safe_tiles.iter().collect::<HashSet<_>>().len() != safe_tiles.len() {
          return bad("duplicate tiles".into());
        }
      }
      (PredictionOutput::Dice { target, confidence, .. }, _) => {
        if !(2..=98).contains(target) {
          return bad(format!("dice target {target} out of range"));
        }
        if *confidence > 100 {
          return bad(format!("confidence {confidence} out of range"));
        }
      }
      (PredictionOutput::Roulette { numbers, .. }, _) => {
        if numbers.is_empty() || numbers.len() > 6 {
          return bad(format!("{} roulette numbers", numbers.len()));
        }
        if numbers.iter().any(|n| *n > 36) {
          return bad("roulette number out of range".into());
        }
        if numbers.iter().collect::<HashSet<_>>().len() != numbers.len() {
          return bad("duplicate roulette numbers".into());
        }
      }
      _ => return bad("parameters do not match output".into()),
    }

    Ok(())
  }
}

pub struct LocalPredictor {
  rng: StdRng,
}

impl LocalPredictor {
  pub fn new(seed: Option<u64>) -> Self {
    let rng = match seed {
      Some(seed) => StdRng::seed_from_u64(seed),
      None => StdRng::from_entropy(),
    };
    Self { rng }
  }

  pub fn predict(&mut self, params: &PredictionParams) -> PredictionOutput {
    match params {
      PredictionParams::Aviator { history } => self.aviator(history),
      PredictionParams::Mines { picks, .. } => self.mines(*picks),
      PredictionParams::Dice { risk } => self.dice(*risk),
      PredictionParams::Roulette { history } => self.roulette(history),
    }
  }

  fn aviator(&mut self, history: &[f64]) -> PredictionOutput {
    // Low recent rounds lower the ceiling
    let ceiling = if history.is_empty() {
      2.5
    } else {
      let mean = history.iter().sum::<f64>() / history.len() as f64;
      (mean * 0.8).clamp(1.3, 5.0)
    };

    let cashout = self.rng.gen_range(1.15..=ceiling);
    let cashout = ((cashout * 100.0).round() / 100.0).clamp(1.01, 100.0);
    let confidence = (95.0 - cashout * 12.0).clamp(35.0, 90.0) as u8;

    PredictionOutput::Aviator { cashout, confidence }
  }

  fn mines(&mut self, picks: u8) -> PredictionOutput {
    let mut safe_tiles = index::sample(&mut self.rng, TILES as usize, picks as usize)
      .into_iter()
      .map(|tile| tile as u8)
      .collect::<Vec<_>>();
    safe_tiles.sort_unstable();

    PredictionOutput::Mines { safe_tiles }
  }

  fn dice(&mut self, risk: Risk) -> PredictionOutput {
    let chance = risk.win_chance() as i16 + self.rng.gen_range(-5..=5);
    let chance = chance.clamp(2, 98) as u8;
    let over = self.rng.gen_bool(0.5);
    let target = if over { 100 - chance } else { chance };
    let confidence = chance.saturating_sub(self.rng.gen_range(0..=10));

    PredictionOutput::Dice { target: target.clamp(2, 98), over, confidence }
  }

  fn roulette(&mut self, history: &[u8]) -> PredictionOutput {
    let count = self.rng.gen_range(1..=6);

    // Most frequent recent numbers first, random fill after
    let mut freq: HashMap<u8, usize> = HashMap::new();
    for n in history.iter().filter(|n| **n <= 36) {
      *freq.entry(*n).or_default() += 1;
    }
    let mut hot = freq.into_iter().collect::<Vec<_>>();
    hot.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut numbers = hot
      .into_iter()
      .map(|(n, _)| n)
      .take(count / 2)
      .collect::<Vec<_>>();
    while numbers.len() < count {
      let n = self.rng.gen_range(0..=36);
      if !numbers.contains(&n) {
        numbers.push(n);
      }
    }

    let color = Color::of(numbers[0]);
    PredictionOutput::Roulette { numbers, color }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn all_params() -> Vec<PredictionParams> {
    vec![
      PredictionParams::Aviator { history: vec![1.2, 3.4, 12.0] },
      PredictionParams::Aviator { history: vec![] },
      PredictionParams::Mines { mines: 3, picks: 5 },
      PredictionParams::Mines { mines: 24, picks: 1 },
      PredictionParams::Dice { risk: Risk::Low },
      PredictionParams::Dice { risk: Risk::High },
      PredictionParams::Roulette { history: vec![7, 7, 0, 32] },
      PredictionParams::Roulette { history: vec![] },
    ]
  }

  #[test]
  fn local_outputs_are_valid() {
    let mut predictor = LocalPredictor::new(Some(42));

    for params in all_params() {
      params.validate().unwrap();
      for _ in 0..200 {
        let output = predictor.predict(&params);
        output.validate(&params).unwrap();
      }
    }
  }

  #[test]
  fn seeded_predictor_is_reproducible() {
    let params = PredictionParams::Mines { mines: 5, picks: 4 };
    let a = LocalPredictor::new(Some(7)).predict(&params);
    let b = LocalPredictor::new(Some(7)).predict(&params);
    assert_eq!(a, b);
  }

  #[test]
  fn rejects_bad_params() {
    let cases = [
      PredictionParams::Mines { mines: 0, picks: 1 },
      PredictionParams::Mines { mines: 25, picks: 1 },
      PredictionParams::Mines { mines: 20, picks: 6 },
      PredictionParams::Mines { mines: 3, picks: 11 },
      PredictionParams::Aviator { history: vec![0.5] },
      PredictionParams::Aviator { history: vec![2.0; 51] },
      PredictionParams::Roulette { history: vec![37] },
    ];

    for params in cases {
      assert!(params.validate().is_err(), "{params:?}");
    }
  }

  #[test]
  fn parses_tagged_json() {
    let params: PredictionParams =
      json::from_str(r#"{"game":"dice","risk":"medium"}"#).unwrap();
    assert_eq!(params, PredictionParams::Dice { risk: Risk::Medium });
  }

  #[test]
  fn parses_model_output() {
    let text = "```json\n{\"safe_tiles\": [0, 4, 9]}\n```";
    let output = PredictionOutput::parse(Game::Mines, text).unwrap();
    assert_eq!(output, PredictionOutput::Mines { safe_tiles: vec![0, 4, 9] });

    let params = PredictionParams::Mines { mines: 3, picks: 2 };
    assert!(output.validate(&params).is_err());

    assert!(PredictionOutput::parse(Game::Dice, "not json").is_err());
  }

  #[test]
  fn roulette_colors() {
    assert_eq!(Color::of(0), Color::Green);
    assert_eq!(Color::of(1), Color::Red);
    assert_eq!(Color::of(2), Color::Black);
    assert_eq!(Color::of(36), Color::Red);
  }
}
