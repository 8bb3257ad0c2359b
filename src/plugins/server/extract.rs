use axum::{
  extract::FromRequestParts,
  http::{header::AUTHORIZATION, request::Parts},
};
use serde::Deserialize;

use crate::{entity::user, prelude::*, state::AppState, sv::Actor};

/// Account behind the `Authorization: Bearer` header.
pub struct AuthUser(pub user::Model);

impl FromRequestParts<Arc<AppState>> for AuthUser {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let token = parts
      .headers
      .get(AUTHORIZATION)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|token| !token.is_empty())
      .ok_or(Error::Unauthorized)?;

    let user = app.sv().auth.authenticate(token).await?;
    Ok(AuthUser(user))
  }
}

/// Assistant or higher.
pub struct Staff(pub user::Model);

impl Staff {
  pub fn actor(&self) -> Actor {
    Actor::user(&self.0)
  }
}

impl FromRequestParts<Arc<AppState>> for Staff {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    app: &Arc<AppState>,
  ) -> Result<Self> {
    let AuthUser(user) = AuthUser::from_request_parts(parts, app).await?;
    if !user.role.is_staff() {
      return Err(Error::Forbidden);
    }
    Ok(Staff(user))
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
  pub cursor: Option<i64>,
  pub limit: Option<u64>,
}
