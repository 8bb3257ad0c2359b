use serde::Serialize;

use super::{Actor, Audit};
use crate::{
  entity::{Game, prompt},
  prelude::*,
};

/// Stored overrides by key; `None` caches the absence of a row.
pub type PromptCache = DashMap<String, Option<prompt::Model>>;

pub const PREDICTION_SYSTEM: &str = "prediction.system";
pub const CHAT_SYSTEM: &str = "chat.system";

pub fn prediction_key(game: Game) -> String {
  format!("prediction.{game}")
}

fn default_template(key: &str) -> Option<&'static str> {
  Some(match key {
    PREDICTION_SYSTEM => {
      "You are PredictPro, an analyst for casino mini-games. Study the \
       data you are given and answer with a single JSON object that \
       matches the response schema. Never add commentary."
    }
    "prediction.aviator" => {
      "Game: Aviator crash. Most recent multipliers, newest last: \
       {{history}}. Suggest a cash-out multiplier between 1.01 and 100 \
       and your confidence from 0 to 100."
    }
    "prediction.mines" => {
      "Game: Mines on a 5x5 board with tiles numbered 0 to 24 row by row. \
       The board hides {{mines}} mines. Pick exactly {{picks}} distinct \
       tiles least likely to hide a mine."
    }
    "prediction.dice" => {
      "Game: Dice rolling 0 to 100. The player wants a {{risk}} risk call. \
       Suggest a target between 2 and 98, whether to bet over it, and \
       your confidence from 0 to 100."
    }
    "prediction.roulette" => {
      "Game: European roulette. Most recent numbers, newest last: \
       {{history}}. Suggest between 1 and 6 distinct numbers and the \
       color most likely to come next."
    }
    CHAT_SYSTEM => {
      "You are the PredictPro support assistant talking to {{name}}. \
       Their licenses: {{licenses}}. Answer questions about plans, \
       payments, referrals and how predictions work. Be short and \
       friendly. Never promise winnings. If you cannot help, say that a \
       staff member will follow up."
    }
    _ => return None,
  })
}

pub fn keys() -> Vec<String> {
  let mut keys = vec![PREDICTION_SYSTEM.to_string()];
  keys.extend(Game::ALL.into_iter().map(prediction_key));
  keys.push(CHAT_SYSTEM.to_string());
  keys
}

/// Replace `{{name}}` placeholders; an unknown name is an error.
pub fn render(template: &str, vars: &HashMap<&str, String>) -> Result<String> {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;

  while let Some(start) = rest.find("{{") {
    out.push_str(&rest[..start]);
    let after = &rest[start + 2..];
    let end = after
      .find("}}")
      .ok_or_else(|| Error::Prompt("unclosed `{{` placeholder".into()))?;

    let name = after[..end].trim();
    let value = vars
      .get(name)
      .ok_or_else(|| Error::Prompt(format!("unknown placeholder `{name}`")))?;
    out.push_str(value);
    rest = &after[end + 2..];
  }

  out.push_str(rest);
  Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptView {
  pub key: String,
  pub template: String,
  pub model: Option<String>,
  pub is_default: bool,
  pub updated_at: Option<DateTime>,
}

pub struct Prompt<'a> {
  db: &'a DatabaseConnection,
  cache: &'a PromptCache,
}

impl<'a> Prompt<'a> {
  pub fn new(db: &'a DatabaseConnection, cache: &'a PromptCache) -> Self {
    Self { db, cache }
  }

  async fn stored(&self, key: &str) -> Result<Option<prompt::Model>> {
    if let Some(cached) = self.cache.get(key) {
      return Ok(cached.clone());
    }

    let row = prompt::Entity::find_by_id(key).one(self.db).await?;
    Ok(self.fill(key, row))
  }

  /// Caches a row loaded by a reader unless a writer got there first.
  fn fill(
    &self,
    key: &str,
    row: Option<prompt::Model>,
  ) -> Option<prompt::Model> {
    self.cache.entry(key.to_string()).or_insert(row).value().clone()
  }

  pub async fn get(&self, key: &str) -> Result<PromptView> {
    let default = default_template(key);

    match (self.stored(key).await?, default) {
      (Some(row), _) => Ok(PromptView {
        key: row.key,
        template: row.template,
        model: row.model,
        is_default: false,
        updated_at: Some(row.updated_at),
      }),
      (None, Some(template)) => Ok(PromptView {
        key: key.to_string(),
        template: template.to_string(),
        model: None,
        is_default: true,
        updated_at: None,
      }),
      (None, None) => Err(Error::PromptNotFound(key.to_string())),
    }
  }

  pub async fn list(&self) -> Result<Vec<PromptView>> {
    let mut views = Vec::new();
    for key in keys() {
      views.push(self.get(&key).await?);
    }
    Ok(views)
  }

  pub async fn upsert(
    &self,
    actor: Actor,
    key: &str,
    template: &str,
    model: Option<String>,
  ) -> Result<PromptView> {
    actor.require_admin()?;

    if default_template(key).is_none() {
      return Err(Error::PromptNotFound(key.to_string()));
    }
    if template.trim().is_empty() {
      return Err(Error::Prompt("template cannot be empty".into()));
    }
    if template.matches("{{").count() != template.matches("}}").count() {
      return Err(Error::Prompt("unbalanced placeholders".into()));
    }

    let model = model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
    let txn = self.db.begin().await?;

    let row = prompt::ActiveModel {
      key: Set(key.to_string()),
      template: Set(template.to_string()),
      model: Set(model.clone()),
      updated_at: Set(utils::now()),
      updated_by: Set(actor.id()),
    };

    let row = match prompt::Entity::find_by_id(key).one(&txn).await? {
      Some(_) => row.update(&txn).await?,
      None => row.insert(&txn).await?,
    };

    Audit::record(
      &txn,
      actor,
      "prompt.update",
      Some(format!("prompt:{key}")),
      Some(json::json!({ "model": model, "length": template.len() })),
    )
    .await?;

    txn.commit().await?;
    self.cache.insert(key.to_string(), Some(row.clone()));

    Ok(PromptView {
      key: row.key,
      template: row.template,
      model: row.model,
      is_default: false,
      updated_at: Some(row.updated_at),
    })
  }

  /// Drop the override so the built-in template applies again.
  pub async fn reset(&self, actor: Actor, key: &str) -> Result<PromptView> {
    actor.require_admin()?;

    let txn = self.db.begin().await?;
    let deleted = prompt::Entity::delete_by_id(key).exec(&txn).await?;

    if deleted.rows_affected > 0 {
      Audit::record(
        &txn,
        actor,
        "prompt.reset",
        Some(format!("prompt:{key}")),
        None,
      )
      .await?;
    }

    txn.commit().await?;
    self.cache.insert(key.to_string(), None);

    self.get(key).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{entity::UserRole, sv::test_utils::test_db};

  #[test]
  fn render_replaces_placeholders() {
    let vars = HashMap::from([("name", "Ann".to_string()), ("n", "3".into())]);
    assert_eq!(
      render("Hi {{name}}, {{ n }} left", &vars).unwrap(),
      "Hi Ann, 3 left"
    );
    assert!(matches!(render("{{missing}}", &vars), Err(Error::Prompt(_))));
    assert!(matches!(render("{{name", &vars), Err(Error::Prompt(_))));
  }

  #[test]
  fn defaults_render_with_prediction_vars() {
    use crate::sv::predictor::{PredictionParams, Risk};

    let params = [
      PredictionParams::Aviator { history: vec![1.5] },
      PredictionParams::Mines { mines: 3, picks: 2 },
      PredictionParams::Dice { risk: Risk::Low },
      PredictionParams::Roulette { history: vec![] },
    ];
    for params in params {
      let key = prediction_key(params.game());
      let template = default_template(&key).unwrap();
      render(template, &params.prompt_vars()).unwrap();
    }
  }

  #[tokio::test]
  async fn test_override_and_reset() {
    let db = test_db::setup().await;
    let cache = PromptCache::new();
    let sv = Prompt::new(&db, &cache);

    let original = sv.get("prediction.dice").await.unwrap();
    assert!(original.is_default);

    let updated = sv
      .upsert(Actor::System, "prediction.dice", "Risk: {{risk}}", None)
      .await
      .unwrap();
    assert!(!updated.is_default);

    // Cache holds the fresh row after the write
    assert_eq!(sv.get("prediction.dice").await.unwrap().template, "Risk: {{risk}}");

    let reset = sv.reset(Actor::System, "prediction.dice").await.unwrap();
    assert!(reset.is_default);
    assert_eq!(reset.template, original.template);

    let audit = Audit::new(&db).list(None, None, None).await.unwrap();
    assert_eq!(audit.items.len(), 2);
  }

  #[tokio::test]
  async fn test_cache_keeps_written_value() {
    let db = test_db::setup().await;
    let cache = PromptCache::new();
    let sv = Prompt::new(&db, &cache);
    let key = "prediction.mines";

    // A stale default was cached before the write
    assert!(sv.get(key).await.unwrap().is_default);
    sv.upsert(Actor::System, key, "Mines: {{mines}}", None).await.unwrap();
    assert_eq!(sv.get(key).await.unwrap().template, "Mines: {{mines}}");

    // A read that loaded the old row before the commit lands after it
    let filled = sv.fill(key, None).unwrap();
    assert_eq!(filled.template, "Mines: {{mines}}");

    sv.reset(Actor::System, key).await.unwrap();
    assert!(matches!(cache.get(key).as_deref(), Some(None)));
    assert!(sv.get(key).await.unwrap().is_default);
  }

  #[tokio::test]
  async fn test_reader_does_not_replace_cached_entry() {
    let db = test_db::setup().await;
    let cache = PromptCache::new();
    let sv = Prompt::new(&db, &cache);

    let row = |template: &str| prompt::Model {
      key: CHAT_SYSTEM.to_string(),
      template: template.to_string(),
      model: None,
      updated_at: utils::now(),
      updated_by: None,
    };
    cache.insert(CHAT_SYSTEM.to_string(), Some(row("Be brief.")));

    let filled = sv.fill(CHAT_SYSTEM, Some(row("Old text."))).unwrap();
    assert_eq!(filled.template, "Be brief.");
    assert_eq!(sv.get(CHAT_SYSTEM).await.unwrap().template, "Be brief.");

    // An empty slot takes the loaded row
    cache.remove(CHAT_SYSTEM);
    assert!(sv.fill(CHAT_SYSTEM, None).is_none());
    assert!(sv.get(CHAT_SYSTEM).await.unwrap().is_default);
  }

  #[tokio::test]
  async fn test_upsert_rules() {
    let db = test_db::setup().await;
    let cache = PromptCache::new();
    let sv = Prompt::new(&db, &cache);
    let staff = test_db::user(&db, "s@mail.com", UserRole::Assistant, 0).await;

    assert!(matches!(
      sv.upsert(Actor::user(&staff), CHAT_SYSTEM, "hi", None).await,
      Err(Error::Forbidden)
    ));
    assert!(matches!(
      sv.upsert(Actor::System, "made.up", "hi", None).await,
      Err(Error::PromptNotFound(_))
    ));
    assert!(matches!(
      sv.upsert(Actor::System, CHAT_SYSTEM, "{{name", None).await,
      Err(Error::Prompt(_))
    ));
    assert_eq!(sv.list().await.unwrap().len(), 6);
  }
}
