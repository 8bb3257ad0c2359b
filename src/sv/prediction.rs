use sea_orm::sea_query::Expr;
use serde::Serialize;

use super::{
  Page,
  gateway::{self, GenerateRequest, Gateway},
  license::usable_query,
  page_limit,
  predictor::{LocalPredictor, PredictionOutput, PredictionParams},
  prompt::{self, Prompt, PromptCache},
};
use crate::{
  config::PredictionMode,
  entity::{Feedback, Game, PredictionSource, license, prediction, user},
  prelude::*,
};

const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
pub struct Outcome {
  pub prediction: prediction::Model,
  pub output: PredictionOutput,
  pub rounds_remaining: i32,
}

#[derive(Debug, Default, Serialize)]
pub struct GameSummary {
  pub total: u64,
  pub won: u64,
  pub lost: u64,
  pub pending: u64,
}

pub struct Prediction<'a> {
  db: &'a DatabaseConnection,
  gateway: &'a dyn Gateway,
  prompts: &'a PromptCache,
  mode: PredictionMode,
}

impl<'a> Prediction<'a> {
  pub fn new(
    db: &'a DatabaseConnection,
    gateway: &'a dyn Gateway,
    prompts: &'a PromptCache,
    mode: PredictionMode,
  ) -> Self {
    Self { db, gateway, prompts, mode }
  }

  async fn ask_ai(&self, params: &PredictionParams) -> Result<PredictionOutput> {
    let game = params.game();
    let prompts = Prompt::new(self.db, self.prompts);

    let system = prompts.get(prompt::PREDICTION_SYSTEM).await?;
    let task = prompts.get(&prompt::prediction_key(game)).await?;

    let text = self
      .gateway
      .generate(GenerateRequest {
        system: Some(system.template),
        prompt: prompt::render(&task.template, &params.prompt_vars())?,
        history: Vec::new(),
        schema: Some(gateway::response_schema(game)),
        temperature: TEMPERATURE,
        model: task.model,
      })
      .await?;

    let output = PredictionOutput::parse(game, &text)?;
    output.validate(params)?;
    Ok(output)
  }

  async fn produce(
    &self,
    params: &PredictionParams,
  ) -> (PredictionOutput, PredictionSource) {
    if self.mode == PredictionMode::Ai && self.gateway.is_enabled() {
      match self.ask_ai(params).await {
        Ok(output) => return (output, PredictionSource::Ai),
        Err(err) => {
          warn!("AI prediction for {} failed, using local: {}", params.game(), err)
        }
      }
    }

    (LocalPredictor::new(None).predict(params), PredictionSource::Local)
  }

  /// Generate a prediction and consume one round of the oldest usable
  /// license for the game.
  pub async fn request(
    &self,
    user_id: i64,
    params: PredictionParams,
  ) -> Result<Outcome> {
    let user = user::Entity::find_by_id(user_id)
      .one(self.db)
      .await?
      .ok_or(Error::UserNotFound)?;
    if user.is_suspended {
      return Err(Error::Suspended);
    }

    params.validate()?;
    let game = params.game();

    if usable_query(user_id, game).one(self.db).await?.is_none() {
      return Err(Error::NoActiveLicense(game));
    }

    let (output, source) = self.produce(&params).await;

    let txn = self.db.begin().await?;

    // Re-select inside the transaction, another request may have drained it
    let license = usable_query(user_id, game)
      .one(&txn)
      .await?
      .ok_or(Error::NoActiveLicense(game))?;

    let consumed = license::Entity::update_many()
      .col_expr(
        license::Column::RoundsRemaining,
        Expr::col(license::Column::RoundsRemaining).sub(1),
      )
      .filter(license::Column::Key.eq(&license.key))
      .filter(license::Column::IsActive.eq(true))
      .filter(license::Column::RoundsRemaining.gt(0))
      .exec(&txn)
      .await?;

    if consumed.rows_affected == 0 {
      return Err(Error::NoActiveLicense(game));
    }

    license::Entity::update_many()
      .col_expr(license::Column::IsActive, Expr::value(false))
      .filter(license::Column::Key.eq(&license.key))
      .filter(license::Column::RoundsRemaining.lte(0))
      .exec(&txn)
      .await?;

    let rounds_remaining = license.rounds_remaining - 1;

    let request = json::to_value(&params)
      .map_err(|e| Error::Internal(format!("encode params: {e}")))?;
    let response = json::to_value(&output)
      .map_err(|e| Error::Internal(format!("encode output: {e}")))?;

    let prediction = prediction::ActiveModel {
      id: NotSet,
      user_id: Set(user_id),
      license_key: Set(license.key.clone()),
      game: Set(game),
      request: Set(request),
      response: Set(response),
      source: Set(source),
      feedback: Set(Feedback::Pending),
      created_at: Set(utils::now()),
      feedback_at: Set(None),
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    debug!(
      "Prediction {} for user {} ({:?}), {} rounds left on {}",
      prediction.id, user_id, source, rounds_remaining, license.key
    );
    if rounds_remaining == 0 {
      info!("License {} exhausted", license.key);
    }

    Ok(Outcome { prediction, output, rounds_remaining })
  }

  pub async fn history(
    &self,
    user_id: i64,
    game: Option<Game>,
    cursor: Option<i64>,
    limit: Option<u64>,
  ) -> Result<Page<prediction::Model>> {
    let limit = page_limit(limit);
    let mut query = prediction::Entity::find()
      .filter(prediction::Column::UserId.eq(user_id));

    if let Some(game) = game {
      query = query.filter(prediction::Column::Game.eq(game));
    }
    if let Some(cursor) = cursor {
      query = query.filter(prediction::Column::Id.lt(cursor));
    }

    let items = query
      .order_by_desc(prediction::Column::Id)
      .limit(limit + 1)
      .all(self.db)
      .await?;

    Ok(Page::new(items, limit, |p| p.id as i64))
  }

  pub async fn feedback(
    &self,
    user_id: i64,
    id: i32,
    feedback: Feedback,
  ) -> Result<prediction::Model> {
    if feedback == Feedback::Pending {
      return Err(Error::InvalidArgs("Feedback must be won or lost".into()));
    }

    let prediction = prediction::Entity::find_by_id(id)
      .filter(prediction::Column::UserId.eq(user_id))
      .one(self.db)
      .await?
      .ok_or(Error::PredictionNotFound)?;

    // Conditional so two concurrent answers cannot both land
    let result = prediction::Entity::update_many()
      .col_expr(prediction::Column::Feedback, Expr::value(feedback))
      .col_expr(prediction::Column::FeedbackAt, Expr::value(utils::now()))
      .filter(prediction::Column::Id.eq(prediction.id))
      .filter(prediction::Column::Feedback.eq(Feedback::Pending))
      .exec(self.db)
      .await?;

    if result.rows_affected == 0 {
      return Err(Error::FeedbackAlreadySet);
    }

    prediction::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::PredictionNotFound)
  }

  /// Win/loss tally per game, for one user or everyone.
  pub async fn summary(
    &self,
    user_id: Option<i64>,
  ) -> Result<HashMap<Game, GameSummary>> {
    let mut query = prediction::Entity::find()
      .select_only()
      .column(prediction::Column::Game)
      .column(prediction::Column::Feedback)
      .column_as(Expr::col(prediction::Column::Id).count(), "count")
      .group_by(prediction::Column::Game)
      .group_by(prediction::Column::Feedback);

    if let Some(user_id) = user_id {
      query = query.filter(prediction::Column::UserId.eq(user_id));
    }

    let rows: Vec<(Game, Feedback, i64)> =
      query.into_tuple().all(self.db).await?;

    let mut summary: HashMap<Game, GameSummary> = HashMap::new();
    for (game, feedback, count) in rows {
      let entry = summary.entry(game).or_default();
      let count = count as u64;
      entry.total += count;
      match feedback {
        Feedback::Won => entry.won += count,
        Feedback::Lost => entry.lost += count,
        Feedback::Pending => entry.pending += count,
      }
    }

    Ok(summary)
  }
}
