use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;

use crate::entity::{Game, TransactionStatus};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("database error: {0}")]
  Db(#[from] DbErr),

  #[error("user not found")]
  UserNotFound,
  #[error("email already registered")]
  EmailTaken,
  #[error("invalid credentials")]
  InvalidCredentials,
  #[error("unauthorized")]
  Unauthorized,
  #[error("forbidden")]
  Forbidden,
  #[error("account suspended")]
  Suspended,

  #[error("plan not found")]
  PlanNotFound,
  #[error("plan is not on sale")]
  PlanInactive,
  #[error("license not found")]
  LicenseNotFound,
  #[error("no usable {0} license")]
  NoActiveLicense(Game),
  #[error("license cannot be activated")]
  LicenseInvalid,

  #[error("transaction not found")]
  TransactionNotFound,
  #[error("transaction cannot move from {from:?} to {to:?}")]
  InvalidTransition { from: TransactionStatus, to: TransactionStatus },
  #[error("insufficient balance")]
  InsufficientBalance,

  #[error("prediction not found")]
  PredictionNotFound,
  #[error("feedback already recorded")]
  FeedbackAlreadySet,

  #[error("referral code not found")]
  ReferralNotFound,

  #[error("prompt `{0}` not found")]
  PromptNotFound(String),
  #[error("prompt error: {0}")]
  Prompt(String),

  #[error("AI gateway error: {0}")]
  Gateway(String),
  #[error("AI gateway is not configured")]
  GatewayUnavailable,

  #[error("token error: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),
  #[error("invalid arguments: {0}")]
  InvalidArgs(String),
  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  pub fn user_message(&self) -> String {
    match self {
      Error::Db(_) | Error::Internal(_) => {
        "Something went wrong, please try again later".into()
      }
      Error::Token(_) => "Session expired, please sign in again".into(),
      Error::Gateway(_) | Error::GatewayUnavailable => {
        "The prediction engine is unavailable right now".into()
      }
      Error::InvalidArgs(msg) => msg.clone(),
      Error::NoActiveLicense(game) => {
        format!("You have no rounds left for {game}. Buy a plan to continue.")
      }
      Error::InsufficientBalance => "Insufficient wallet balance".into(),
      other => {
        let text = other.to_string();
        let mut chars = text.chars();
        match chars.next() {
          Some(first) => first.to_uppercase().chain(chars).collect(),
          None => text,
        }
      }
    }
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Error::Db(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
      Error::InvalidCredentials | Error::Unauthorized | Error::Token(_) => {
        StatusCode::UNAUTHORIZED
      }
      Error::Forbidden | Error::Suspended => StatusCode::FORBIDDEN,
      Error::UserNotFound
      | Error::PlanNotFound
      | Error::LicenseNotFound
      | Error::TransactionNotFound
      | Error::PredictionNotFound
      | Error::ReferralNotFound
      | Error::PromptNotFound(_) => StatusCode::NOT_FOUND,
      Error::EmailTaken
      | Error::InvalidTransition { .. }
      | Error::FeedbackAlreadySet
      | Error::PlanInactive
      | Error::LicenseInvalid => StatusCode::CONFLICT,
      Error::InsufficientBalance | Error::NoActiveLicense(_) => {
        StatusCode::PAYMENT_REQUIRED
      }
      Error::Gateway(_) | Error::GatewayUnavailable => StatusCode::BAD_GATEWAY,
      Error::Prompt(_) | Error::InvalidArgs(_) => StatusCode::BAD_REQUEST,
    }
  }
}

#[derive(Serialize)]
pub struct Status {
  pub success: bool,
  pub msg: Option<String>,
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!("request failed: {self}");
    }

    (status, Json(Status { success: false, msg: Some(self.user_message()) }))
      .into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn internal_details_are_hidden() {
    let err = Error::Db(DbErr::Custom("disk I/O error".into()));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!err.user_message().contains("disk"));
  }

  #[test]
  fn statuses() {
    assert_eq!(Error::EmailTaken.status(), StatusCode::CONFLICT);
    assert_eq!(
      Error::NoActiveLicense(Game::Mines).status(),
      StatusCode::PAYMENT_REQUIRED
    );
    assert_eq!(Error::LicenseNotFound.user_message(), "License not found");
    assert_eq!(
      Error::InvalidTransition {
        from: TransactionStatus::Verified,
        to: TransactionStatus::Failed
      }
      .status(),
      StatusCode::CONFLICT
    );
  }
}
