use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use teloxide::utils::html;

use super::extract::{AuthUser, PageQuery};
use crate::{
  entity::{
    Feedback, Game, TransactionStatus, chat_message, license, notification,
    plan, prediction, transaction, user,
  },
  error::Status,
  prelude::*,
  state::AppState,
  sv::{
    Page,
    chat::ChatReply,
    license::PurchaseMethod,
    prediction::{GameSummary, Outcome},
    predictor::PredictionParams,
    referral::{Referee, ReferralStats},
  },
};

type App = State<Arc<AppState>>;

pub async fn health() -> Json<Status> {
  Json(Status { success: true, msg: None })
}

#[derive(Deserialize)]
pub struct RegisterReq {
  pub email: String,
  #[serde(default)]
  pub display_name: String,
  pub password: String,
  pub referral_code: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginReq {
  pub email: String,
  pub password: String,
}

#[derive(Serialize)]
pub struct Session {
  pub user: user::Model,
  pub token: String,
}

pub async fn register(
  State(app): App,
  Json(req): Json<RegisterReq>,
) -> Result<Json<Session>> {
  let (user, token) = app
    .sv()
    .auth
    .register(
      &req.email,
      &req.display_name,
      &req.password,
      req.referral_code.as_deref(),
    )
    .await?;
  Ok(Json(Session { user, token }))
}

pub async fn login(
  State(app): App,
  Json(req): Json<LoginReq>,
) -> Result<Json<Session>> {
  let (user, token) = app.sv().auth.login(&req.email, &req.password).await?;
  Ok(Json(Session { user, token }))
}

#[derive(Deserialize)]
pub struct GameQuery {
  pub game: Option<Game>,
}

pub async fn plans(
  State(app): App,
  Query(query): Query<GameQuery>,
) -> Result<Json<Vec<plan::Model>>> {
  Ok(Json(app.sv().plan.list(query.game, false).await?))
}

#[derive(Serialize)]
pub struct Me {
  pub user: user::Model,
  pub unread: u64,
  /// Usable rounds per game.
  pub rounds: HashMap<Game, i64>,
}

pub async fn me(State(app): App, AuthUser(user): AuthUser) -> Result<Json<Me>> {
  let sv = app.sv();
  let unread = sv.notification.unread_count(user.id).await?;

  let mut rounds = HashMap::new();
  for game in Game::ALL {
    rounds.insert(game, sv.license.rounds_left(user.id, game).await?);
  }

  Ok(Json(Me { user, unread, rounds }))
}

pub async fn licenses(
  State(app): App,
  AuthUser(user): AuthUser,
) -> Result<Json<Vec<license::Model>>> {
  Ok(Json(app.sv().license.by_user(user.id).await?))
}

pub async fn license(
  State(app): App,
  AuthUser(user): AuthUser,
  Path(key): Path<String>,
) -> Result<Json<license::Model>> {
  let license = app.sv().license.by_key(&key).await?;
  if license.user_id != user.id {
    return Err(Error::LicenseNotFound);
  }
  Ok(Json(license))
}

#[derive(Deserialize)]
pub struct PurchaseReq {
  pub plan_id: i32,
  pub payment: PurchaseMethod,
}

#[derive(Serialize)]
pub struct Purchase {
  pub license: license::Model,
  pub transaction: transaction::Model,
}

pub async fn purchase(
  State(app): App,
  AuthUser(user): AuthUser,
  Json(req): Json<PurchaseReq>,
) -> Result<Json<Purchase>> {
  let (license, transaction) =
    app.sv().license.purchase(user.id, req.plan_id, req.payment).await?;

  if transaction.status == TransactionStatus::Pending {
    let text = purchase_notice(&user, &license, &transaction);
    let notify = app.clone();
    tokio::spawn(async move { notify.notify_admins(&text).await });
  }

  Ok(Json(Purchase { license, transaction }))
}

pub async fn predict(
  State(app): App,
  AuthUser(user): AuthUser,
  Json(params): Json<PredictionParams>,
) -> Result<Json<Outcome>> {
  Ok(Json(app.sv().prediction.request(user.id, params).await?))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
  pub game: Option<Game>,
  pub cursor: Option<i64>,
  pub limit: Option<u64>,
}

pub async fn predictions(
  State(app): App,
  AuthUser(user): AuthUser,
  Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<prediction::Model>>> {
  Ok(Json(
    app
      .sv()
      .prediction
      .history(user.id, query.game, query.cursor, query.limit)
      .await?,
  ))
}

#[derive(Deserialize)]
pub struct FeedbackReq {
  pub result: Feedback,
}

pub async fn feedback(
  State(app): App,
  AuthUser(user): AuthUser,
  Path(id): Path<i32>,
  Json(req): Json<FeedbackReq>,
) -> Result<Json<prediction::Model>> {
  Ok(Json(app.sv().prediction.feedback(user.id, id, req.result).await?))
}

pub async fn summary(
  State(app): App,
  AuthUser(user): AuthUser,
) -> Result<Json<HashMap<Game, GameSummary>>> {
  Ok(Json(app.sv().prediction.summary(Some(user.id)).await?))
}

#[derive(Serialize)]
pub struct Wallet {
  pub balance: i64,
  pub formatted: String,
}

pub async fn wallet(
  State(app): App,
  AuthUser(user): AuthUser,
) -> Result<Json<Wallet>> {
  let balance = app.sv().balance.get(user.id).await?;
  Ok(Json(Wallet { balance, formatted: utils::format_money(balance) }))
}

pub async fn transactions(
  State(app): App,
  AuthUser(user): AuthUser,
  Query(page): Query<PageQuery>,
) -> Result<Json<Page<transaction::Model>>> {
  Ok(Json(
    app.sv().balance.transactions(user.id, page.cursor, page.limit).await?,
  ))
}

#[derive(Deserialize)]
pub struct DepositReq {
  pub amount: i64,
  pub method: String,
  pub reference: String,
}

pub async fn deposit(
  State(app): App,
  AuthUser(user): AuthUser,
  Json(req): Json<DepositReq>,
) -> Result<Json<transaction::Model>> {
  let tx = app
    .sv()
    .balance
    .deposit_request(user.id, req.amount, &req.method, &req.reference)
    .await?;

  let text = deposit_notice(&user, &tx, &req.method, &req.reference);
  let notify = app.clone();
  tokio::spawn(async move { notify.notify_admins(&text).await });

  Ok(Json(tx))
}

#[derive(Deserialize)]
pub struct WithdrawReq {
  pub amount: i64,
  pub destination: String,
}

pub async fn withdraw(
  State(app): App,
  AuthUser(user): AuthUser,
  Json(req): Json<WithdrawReq>,
) -> Result<Json<transaction::Model>> {
  let tx = app
    .sv()
    .balance
    .withdraw_request(user.id, req.amount, &req.destination)
    .await?;

  let text = withdraw_notice(&user, &tx, &req.destination);
  let notify = app.clone();
  tokio::spawn(async move { notify.notify_admins(&text).await });

  Ok(Json(tx))
}

#[derive(Serialize)]
pub struct Referrals {
  pub stats: ReferralStats,
  pub referrals: Vec<Referee>,
}

pub async fn referrals(
  State(app): App,
  AuthUser(user): AuthUser,
) -> Result<Json<Referrals>> {
  let sv = app.sv();
  Ok(Json(Referrals {
    stats: sv.referral.stats(user.id).await?,
    referrals: sv.referral.referrals(user.id).await?,
  }))
}

#[derive(Deserialize)]
pub struct LimitQuery {
  pub limit: Option<u64>,
}

pub async fn chat_history(
  State(app): App,
  AuthUser(user): AuthUser,
  Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<chat_message::Model>>> {
  let limit = crate::sv::page_limit(query.limit);
  Ok(Json(app.sv().chat.history(user.id, limit).await?))
}

#[derive(Deserialize)]
pub struct ChatReq {
  pub text: String,
}

pub async fn chat_send(
  State(app): App,
  AuthUser(user): AuthUser,
  Json(req): Json<ChatReq>,
) -> Result<Json<ChatReply>> {
  let reply = app.sv().chat.send(user.id, &req.text).await?;

  if reply.handed_off {
    let text = handoff_notice(&user, &req.text);
    let notify = app.clone();
    tokio::spawn(async move { notify.notify_admins(&text).await });
  }

  Ok(Json(reply))
}

#[derive(Deserialize)]
pub struct NotificationQuery {
  #[serde(default)]
  pub unread: bool,
  pub cursor: Option<i64>,
  pub limit: Option<u64>,
}

pub async fn notifications(
  State(app): App,
  AuthUser(user): AuthUser,
  Query(query): Query<NotificationQuery>,
) -> Result<Json<Page<notification::Model>>> {
  Ok(Json(
    app
      .sv()
      .notification
      .list(user.id, query.unread, query.cursor, query.limit)
      .await?,
  ))
}

pub async fn read_notification(
  State(app): App,
  AuthUser(user): AuthUser,
  Path(id): Path<i32>,
) -> Result<Json<Status>> {
  let success = app.sv().notification.mark_read(user.id, id).await?;
  Ok(Json(Status { success, msg: None }))
}

pub async fn read_all_notifications(
  State(app): App,
  AuthUser(user): AuthUser,
) -> Result<Json<Status>> {
  let count = app.sv().notification.mark_all_read(user.id).await?;
  Ok(Json(Status { success: true, msg: Some(format!("{count} marked read")) }))
}

fn sender(user: &user::Model) -> String {
  format!(
    "User: {} (<code>{}</code>)",
    html::escape(&user.display_name),
    user.id
  )
}

fn purchase_notice(
  user: &user::Model,
  license: &license::Model,
  tx: &transaction::Model,
) -> String {
  format!(
    "🧾 <b>New purchase</b> #{}\n{}\nGame: {} ({} rounds)\nAmount: {}\n\
     Method: {} / <code>{}</code>\n\n/verify {} or /fail {} &lt;reason&gt;",
    tx.id,
    sender(user),
    license.game,
    license.rounds_total,
    utils::format_money(-tx.amount),
    html::escape(tx.method.as_deref().unwrap_or("-")),
    html::escape(tx.reference.as_deref().unwrap_or("-")),
    tx.id,
    tx.id,
  )
}

fn deposit_notice(
  user: &user::Model,
  tx: &transaction::Model,
  method: &str,
  reference: &str,
) -> String {
  format!(
    "💰 <b>New deposit</b> #{}\n{}\nAmount: {}\n\
     Method: {} / <code>{}</code>",
    tx.id,
    sender(user),
    utils::format_money(tx.amount),
    html::escape(method),
    html::escape(reference),
  )
}

fn withdraw_notice(
  user: &user::Model,
  tx: &transaction::Model,
  destination: &str,
) -> String {
  format!(
    "💸 <b>Withdrawal request</b> #{}\n{}\nAmount: {}\nTo: <code>{}</code>",
    tx.id,
    sender(user),
    utils::format_money(-tx.amount),
    html::escape(destination),
  )
}

fn handoff_notice(user: &user::Model, text: &str) -> String {
  format!(
    "💬 <b>Support needed</b>\n{}\n\n{}",
    sender(user),
    html::escape(text.trim())
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::UserRole,
    sv::{Balance, License, test_utils::test_db},
  };

  #[tokio::test]
  async fn test_notices_escape_user_text() {
    let db = test_db::setup().await;
    let mut user = test_db::user(&db, "eve@mail.com", UserRole::User, 0).await;
    user.display_name = "<b>Eve</b> & co".into();
    let plan = test_db::plan(&db, Game::Dice, 10, 500).await;

    let (license, tx) = License::new(&db)
      .purchase(
        user.id,
        plan.id,
        PurchaseMethod::External {
          method: "usdt<trc20>".into(),
          reference: "a<b".into(),
        },
      )
      .await
      .unwrap();

    let text = purchase_notice(&user, &license, &tx);
    assert!(text.contains("&lt;b&gt;Eve&lt;/b&gt; &amp; co"));
    assert!(text.contains("usdt&lt;trc20&gt; / <code>a&lt;b</code>"));
    assert!(!text.contains("<b>Eve"));
    assert!(text.ends_with("&lt;reason&gt;"));

    let tx = Balance::new(&db)
      .deposit_request(user.id, 1000, "card", "x<y&z")
      .await
      .unwrap();
    let text = deposit_notice(&user, &tx, "card", "x<y&z");
    assert!(text.contains("<code>x&lt;y&amp;z</code>"));
    assert!(text.starts_with("💰 <b>New deposit</b>"));
  }

  #[tokio::test]
  async fn test_withdraw_and_handoff_notices_escape_user_text() {
    let db = test_db::setup().await;
    let mut user =
      test_db::user(&db, "fay@mail.com", UserRole::User, 5000).await;
    user.display_name = "Fay <3".into();

    let tx = Balance::new(&db)
      .withdraw_request(user.id, 2000, "<script>")
      .await
      .unwrap();
    let text = withdraw_notice(&user, &tx, "<script>");
    assert!(text.contains("Fay &lt;3"));
    assert!(text.contains("To: <code>&lt;script&gt;</code>"));

    let text = handoff_notice(&user, "  is 5 < 6 & 7 > 3?\n");
    assert!(text.ends_with("\n\nis 5 &lt; 6 &amp; 7 &gt; 3?"));
    assert!(text.contains("<b>Support needed</b>"));
  }
}
