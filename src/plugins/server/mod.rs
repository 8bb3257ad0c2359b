mod admin;
mod extract;
mod handlers;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
  Router,
  routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};

use crate::{prelude::*, state::AppState};

pub fn routes() -> Router<Arc<AppState>> {
  let admin = Router::new()
    .route("/stats", get(admin::stats))
    .route("/transactions/pending", get(admin::pending))
    .route("/transactions/{id}/verify", post(admin::verify))
    .route("/transactions/{id}/fail", post(admin::fail))
    .route("/users", get(admin::users))
    .route("/users/{id}", get(admin::user))
    .route("/users/{id}/role", post(admin::set_role))
    .route("/users/{id}/suspend", post(admin::suspend))
    .route("/users/{id}/commission", post(admin::commission))
    .route("/licenses/grant", post(admin::grant))
    .route("/licenses/{key}/active", post(admin::set_license_active))
    .route("/plans", get(admin::plans).post(admin::create_plan))
    .route("/plans/{id}", get(admin::plan).patch(admin::update_plan))
    .route("/prompts", get(admin::prompts))
    .route(
      "/prompts/{key}",
      put(admin::upsert_prompt).delete(admin::reset_prompt),
    )
    .route("/broadcasts", get(admin::broadcasts).post(admin::send_broadcast))
    .route("/broadcasts/preview", post(admin::preview_broadcast))
    .route("/audit", get(admin::audit))
    .route("/chats", get(admin::chats))
    .route("/chats/{user_id}", get(admin::chat).post(admin::chat_reply))
    .route("/referrals/top", get(admin::top_referrers))
    .route("/predictions/summary", get(admin::prediction_summary));

  Router::new()
    .route("/health", get(handlers::health))
    .route("/api/auth/register", post(handlers::register))
    .route("/api/auth/login", post(handlers::login))
    .route("/api/plans", get(handlers::plans))
    .route("/api/me", get(handlers::me))
    .route("/api/licenses", get(handlers::licenses))
    .route("/api/licenses/purchase", post(handlers::purchase))
    .route("/api/licenses/{key}", get(handlers::license))
    .route(
      "/api/predictions",
      get(handlers::predictions).post(handlers::predict),
    )
    .route("/api/predictions/summary", get(handlers::summary))
    .route("/api/predictions/{id}/feedback", post(handlers::feedback))
    .route("/api/wallet", get(handlers::wallet))
    .route("/api/wallet/transactions", get(handlers::transactions))
    .route("/api/wallet/deposit", post(handlers::deposit))
    .route("/api/wallet/withdraw", post(handlers::withdraw))
    .route("/api/referrals", get(handlers::referrals))
    .route("/api/chat", get(handlers::chat_history).post(handlers::chat_send))
    .route("/api/notifications", get(handlers::notifications))
    .route(
      "/api/notifications/{id}/read",
      post(handlers::read_notification),
    )
    .route(
      "/api/notifications/read-all",
      post(handlers::read_all_notifications),
    )
    .nest("/api/admin", admin)
}

pub struct Plugin;

#[async_trait]
impl super::Plugin for Plugin {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    let governor_conf = Arc::new(
      GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(100)
        .finish()
        .context("Failed to build rate limiter config")?,
    );

    let governor_limiter = governor_conf.limiter().clone();

    tokio::spawn(async move {
      loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        governor_limiter.retain_recent();
      }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], app.config.port));

    let router = routes()
      .layer(
        ServiceBuilder::new()
          .layer(TraceLayer::new_for_http())
          .layer(GovernorLayer::new(governor_conf))
          .layer(
            CorsLayer::new()
              .allow_origin(Any)
              .allow_methods(Any)
              .allow_headers(Any),
          ),
      )
      .with_state(app)
      .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr)
      .await
      .with_context(|| format!("Failed to bind {addr}"))?;
    info!("HTTP server listening on {addr}");

    axum::serve(listener, router).await.context("HTTP server error")?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
  };
  use tower::ServiceExt;

  use super::*;
  use crate::{
    config::Config,
    entity::{Game, UserRole},
    sv::{Actor, gateway::Disabled, test_utils::test_db},
  };

  async fn app() -> Arc<AppState> {
    let db = test_db::setup().await;
    Arc::new(AppState::with_parts(
      db,
      None,
      Config::for_tests(),
      Arc::new(Disabled),
    ))
  }

  async fn call(
    app: &Arc<AppState>,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<json::Value>,
  ) -> (StatusCode, json::Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
      Some(body) => req
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => req.body(Body::empty()).unwrap(),
    };

    let res = routes().with_state(app.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = json::from_slice(&bytes).unwrap_or(json::Value::Null);
    (status, value)
  }

  async fn register(app: &Arc<AppState>, email: &str) -> (i64, String) {
    let (status, body) = call(
      app,
      Method::POST,
      "/api/auth/register",
      None,
      Some(json::json!({ "email": email, "password": "hunter22hunter" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let id = body["user"]["id"].as_i64().unwrap();
    (id, body["token"].as_str().unwrap().to_string())
  }

  #[tokio::test]
  async fn test_auth_flow() {
    let app = app().await;

    let (status, _) = call(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, token) = register(&app, "alice@mail.com").await;

    let (status, body) =
      call(&app, Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@mail.com");
    assert!(body["user"].get("password_hash").is_none());

    let (status, _) = call(&app, Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(
      &app,
      Method::POST,
      "/api/auth/login",
      None,
      Some(json::json!({
        "email": "alice@mail.com",
        "password": "wrong-password"
      })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
  }

  #[tokio::test]
  async fn test_predict_consumes_rounds() {
    let app = app().await;
    let (id, token) = register(&app, "bob@mail.com").await;

    let (status, _) = call(
      &app,
      Method::POST,
      "/api/predictions",
      Some(&token),
      Some(json::json!({ "game": "dice", "risk": "low" })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    app.sv().license.grant(Actor::System, id, Game::Dice, 2).await.unwrap();

    let (status, body) = call(
      &app,
      Method::POST,
      "/api/predictions",
      Some(&token),
      Some(json::json!({ "game": "dice", "risk": "low" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["rounds_remaining"], 1);

    let (_, me) = call(&app, Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(me["rounds"]["dice"], 1);
    assert_eq!(me["rounds"]["mines"], 0);
    assert_eq!(body["output"]["game"], "dice");

    let prediction = body["prediction"]["id"].as_i64().unwrap();
    let uri = format!("/api/predictions/{prediction}/feedback");
    let (status, _) = call(
      &app,
      Method::POST,
      &uri,
      Some(&token),
      Some(json::json!({ "result": "won" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
      &app,
      Method::POST,
      &uri,
      Some(&token),
      Some(json::json!({ "result": "lost" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn test_admin_routes_require_staff() {
    let app = app().await;
    let (_, user_token) = register(&app, "carol@mail.com").await;
    let (_, root_token) = register(&app, "root@predictpro.test").await;

    let stats = "/api/admin/stats";
    let (status, _) =
      call(&app, Method::GET, stats, Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
      call(&app, Method::GET, stats, Some(&root_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 2);
  }

  #[tokio::test]
  async fn test_admin_plan_lookup_and_update() {
    let app = app().await;
    let (_, user_token) = register(&app, "erin@mail.com").await;
    let (_, root_token) = register(&app, "root@predictpro.test").await;
    let plan = test_db::plan(&app.db, Game::Aviator, 20, 900).await;
    let uri = format!("/api/admin/plans/{}", plan.id);

    let (status, _) =
      call(&app, Method::GET, &uri, Some(&user_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
      call(&app, Method::GET, &uri, Some(&root_token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["price"], 900);

    let (status, _) = call(
      &app,
      Method::PATCH,
      &uri,
      Some(&root_token),
      Some(json::json!({ "price": 1200 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) =
      call(&app, Method::GET, &uri, Some(&root_token), None).await;
    assert_eq!(body["price"], 1200);

    let missing = "/api/admin/plans/99999";
    let (status, _) =
      call(&app, Method::GET, missing, Some(&root_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn test_external_purchase_is_verified_by_staff() {
    let app = app().await;
    let (_, token) = register(&app, "dave@mail.com").await;
    let (_, root_token) = register(&app, "root@predictpro.test").await;
    let helper =
      test_db::user(&app.db, "help@mail.com", UserRole::Assistant, 0).await;
    let plan = test_db::plan(&app.db, Game::Mines, 10, 500).await;

    let (status, body) = call(
      &app,
      Method::POST,
      "/api/licenses/purchase",
      Some(&token),
      Some(json::json!({
        "plan_id": plan.id,
        "payment": {
          "type": "external",
          "method": "usdt",
          "reference": "0xabc"
        }
      })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["transaction"]["status"], "pending");
    let tx = body["transaction"]["id"].as_i64().unwrap();

    let (_, pending) = call(
      &app,
      Method::GET,
      "/api/admin/transactions/pending",
      Some(&root_token),
      None,
    )
    .await;
    assert_eq!(pending["items"].as_array().unwrap().len(), 1);

    let staff_token = app.sv().auth.issue_token(&helper).unwrap();
    let (status, body) = call(
      &app,
      Method::POST,
      &format!("/api/admin/transactions/{tx}/verify"),
      Some(&staff_token),
      None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "verified");

    let (_, licenses) =
      call(&app, Method::GET, "/api/licenses", Some(&token), None).await;
    assert_eq!(licenses[0]["payment_verified"], true);
    assert_eq!(licenses[0]["is_active"], true);

    let key = licenses[0]["key"].as_str().unwrap();
    let uri = format!("/api/licenses/{key}");
    let (status, _) = call(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) =
      call(&app, Method::GET, &uri, Some(&root_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, me) = call(&app, Method::GET, "/api/me", Some(&token), None).await;
    assert_eq!(me["unread"], 1);
  }
}
