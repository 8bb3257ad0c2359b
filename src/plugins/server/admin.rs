use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use super::{
  extract::{PageQuery, Staff},
  handlers::LimitQuery,
};
use crate::{
  entity::{
    Game, UserRole, audit_log, broadcast, chat_message, license, plan,
    transaction, user,
  },
  prelude::*,
  state::AppState,
  sv::{
    Page, broadcast::AudienceFilter, page_limit, plan::PlanUpdate,
    prediction::GameSummary, prompt::PromptView, stats::Dashboard,
  },
};

type App = State<Arc<AppState>>;

pub async fn stats(State(app): App, _: Staff) -> Result<Json<Dashboard>> {
  Ok(Json(app.sv().stats.dashboard().await?))
}

pub async fn pending(
  State(app): App,
  _: Staff,
  Query(page): Query<PageQuery>,
) -> Result<Json<Page<transaction::Model>>> {
  Ok(Json(app.sv().payment.pending(page.cursor, page.limit).await?))
}

pub async fn verify(
  State(app): App,
  staff: Staff,
  Path(id): Path<i32>,
) -> Result<Json<transaction::Model>> {
  Ok(Json(app.sv().payment.verify(staff.actor(), id).await?))
}

#[derive(Deserialize)]
pub struct FailReq {
  pub reason: String,
}

pub async fn fail(
  State(app): App,
  staff: Staff,
  Path(id): Path<i32>,
  Json(req): Json<FailReq>,
) -> Result<Json<transaction::Model>> {
  Ok(Json(app.sv().payment.fail(staff.actor(), id, &req.reason).await?))
}

#[derive(Deserialize)]
pub struct UsersQuery {
  pub role: Option<UserRole>,
  pub cursor: Option<i64>,
  pub limit: Option<u64>,
}

pub async fn users(
  State(app): App,
  _: Staff,
  Query(query): Query<UsersQuery>,
) -> Result<Json<Page<user::Model>>> {
  Ok(Json(app.sv().user.list(query.role, query.cursor, query.limit).await?))
}

#[derive(Serialize)]
pub struct UserDetails {
  pub user: user::Model,
  pub licenses: Vec<license::Model>,
  pub balance: String,
}

pub async fn user(
  State(app): App,
  _: Staff,
  Path(id): Path<i64>,
) -> Result<Json<UserDetails>> {
  let (user, licenses) = app.sv().user.with_licenses(id).await?;
  let balance = utils::format_money(user.balance);
  Ok(Json(UserDetails { user, licenses, balance }))
}

#[derive(Deserialize)]
pub struct RoleReq {
  pub role: UserRole,
}

pub async fn set_role(
  State(app): App,
  staff: Staff,
  Path(id): Path<i64>,
  Json(req): Json<RoleReq>,
) -> Result<Json<user::Model>> {
  Ok(Json(app.sv().user.set_role(staff.actor(), id, req.role).await?))
}

#[derive(Deserialize)]
pub struct SuspendReq {
  pub suspended: bool,
}

pub async fn suspend(
  State(app): App,
  staff: Staff,
  Path(id): Path<i64>,
  Json(req): Json<SuspendReq>,
) -> Result<Json<user::Model>> {
  Ok(Json(
    app.sv().user.set_suspended(staff.actor(), id, req.suspended).await?,
  ))
}

#[derive(Deserialize)]
pub struct CommissionReq {
  pub rate: i32,
}

pub async fn commission(
  State(app): App,
  staff: Staff,
  Path(id): Path<i64>,
  Json(req): Json<CommissionReq>,
) -> Result<Json<user::Model>> {
  Ok(Json(
    app.sv().referral.set_commission_rate(staff.actor(), id, req.rate).await?,
  ))
}

#[derive(Deserialize)]
pub struct GrantReq {
  pub user_id: i64,
  pub game: Game,
  pub rounds: i32,
}

pub async fn grant(
  State(app): App,
  staff: Staff,
  Json(req): Json<GrantReq>,
) -> Result<Json<license::Model>> {
  Ok(Json(
    app
      .sv()
      .license
      .grant(staff.actor(), req.user_id, req.game, req.rounds)
      .await?,
  ))
}

#[derive(Deserialize)]
pub struct ActiveReq {
  pub active: bool,
}

pub async fn set_license_active(
  State(app): App,
  staff: Staff,
  Path(key): Path<String>,
  Json(req): Json<ActiveReq>,
) -> Result<Json<license::Model>> {
  Ok(Json(
    app.sv().license.set_active(staff.actor(), &key, req.active).await?,
  ))
}

pub async fn plans(
  State(app): App,
  _: Staff,
) -> Result<Json<Vec<plan::Model>>> {
  Ok(Json(app.sv().plan.list(None, true).await?))
}

pub async fn plan(
  State(app): App,
  _: Staff,
  Path(id): Path<i32>,
) -> Result<Json<plan::Model>> {
  Ok(Json(app.sv().plan.by_id(id).await?))
}

#[derive(Deserialize)]
pub struct NewPlan {
  pub game: Game,
  pub name: String,
  pub rounds: i32,
  pub price: i64,
}

pub async fn create_plan(
  State(app): App,
  staff: Staff,
  Json(req): Json<NewPlan>,
) -> Result<Json<plan::Model>> {
  Ok(Json(
    app
      .sv()
      .plan
      .create(staff.actor(), req.game, &req.name, req.rounds, req.price)
      .await?,
  ))
}

pub async fn update_plan(
  State(app): App,
  staff: Staff,
  Path(id): Path<i32>,
  Json(update): Json<PlanUpdate>,
) -> Result<Json<plan::Model>> {
  Ok(Json(app.sv().plan.update(staff.actor(), id, update).await?))
}

pub async fn prompts(
  State(app): App,
  _: Staff,
) -> Result<Json<Vec<PromptView>>> {
  Ok(Json(app.sv().prompt.list().await?))
}

#[derive(Deserialize)]
pub struct PromptReq {
  pub template: String,
  pub model: Option<String>,
}

pub async fn upsert_prompt(
  State(app): App,
  staff: Staff,
  Path(key): Path<String>,
  Json(req): Json<PromptReq>,
) -> Result<Json<PromptView>> {
  Ok(Json(
    app
      .sv()
      .prompt
      .upsert(staff.actor(), &key, &req.template, req.model)
      .await?,
  ))
}

pub async fn reset_prompt(
  State(app): App,
  staff: Staff,
  Path(key): Path<String>,
) -> Result<Json<PromptView>> {
  Ok(Json(app.sv().prompt.reset(staff.actor(), &key).await?))
}

pub async fn broadcasts(
  State(app): App,
  _: Staff,
  Query(page): Query<PageQuery>,
) -> Result<Json<Page<broadcast::Model>>> {
  Ok(Json(app.sv().broadcast.list(page.cursor, page.limit).await?))
}

#[derive(Serialize)]
pub struct Preview {
  pub recipients: usize,
}

pub async fn preview_broadcast(
  State(app): App,
  _: Staff,
  Json(filter): Json<AudienceFilter>,
) -> Result<Json<Preview>> {
  let recipients = app.sv().broadcast.preview(&filter).await?;
  Ok(Json(Preview { recipients }))
}

#[derive(Deserialize)]
pub struct BroadcastReq {
  pub title: String,
  pub body: String,
  #[serde(default)]
  pub audience: AudienceFilter,
}

pub async fn send_broadcast(
  State(app): App,
  staff: Staff,
  Json(req): Json<BroadcastReq>,
) -> Result<Json<broadcast::Model>> {
  Ok(Json(
    app
      .sv()
      .broadcast
      .send(staff.actor(), &req.title, &req.body, req.audience)
      .await?,
  ))
}

#[derive(Deserialize)]
pub struct AuditQuery {
  pub action: Option<String>,
  pub cursor: Option<i64>,
  pub limit: Option<u64>,
}

pub async fn audit(
  State(app): App,
  staff: Staff,
  Query(query): Query<AuditQuery>,
) -> Result<Json<Page<audit_log::Model>>> {
  staff.actor().require_admin()?;
  Ok(Json(
    app
      .sv()
      .audit
      .list(query.action.as_deref(), query.cursor, query.limit)
      .await?,
  ))
}

pub async fn chats(
  State(app): App,
  _: Staff,
  Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<chat_message::Model>>> {
  Ok(Json(app.sv().chat.threads(page_limit(query.limit)).await?))
}

pub async fn chat(
  State(app): App,
  _: Staff,
  Path(user_id): Path<i64>,
  Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<chat_message::Model>>> {
  Ok(Json(app.sv().chat.history(user_id, page_limit(query.limit)).await?))
}

#[derive(Deserialize)]
pub struct ReplyReq {
  pub text: String,
}

pub async fn chat_reply(
  State(app): App,
  staff: Staff,
  Path(user_id): Path<i64>,
  Json(req): Json<ReplyReq>,
) -> Result<Json<chat_message::Model>> {
  Ok(Json(
    app.sv().chat.staff_reply(staff.actor(), user_id, &req.text).await?,
  ))
}

pub async fn top_referrers(
  State(app): App,
  _: Staff,
  Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<user::Model>>> {
  Ok(Json(app.sv().referral.top(page_limit(query.limit)).await?))
}

pub async fn prediction_summary(
  State(app): App,
  _: Staff,
) -> Result<Json<HashMap<Game, GameSummary>>> {
  Ok(Json(app.sv().prediction.summary(None).await?))
}
