use hmac::{Hmac, Mac};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
  config::Config,
  entity::{UserRole, user},
  prelude::*,
};

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2-sha256";
const ROUNDS: u32 = 60_000;
const MIN_PASSWORD: usize = 8;

/// PBKDF2-HMAC-SHA256 with a single 32-byte block.
fn derive(password: &[u8], salt: &[u8], rounds: u32) -> Result<Vec<u8>> {
  let prf = HmacSha256::new_from_slice(password)
    .map_err(|e| Error::Internal(format!("hmac key: {e}")))?;

  let mut mac = prf.clone();
  mac.update(salt);
  mac.update(&1u32.to_be_bytes());
  let mut u = mac.finalize().into_bytes().to_vec();
  let mut out = u.clone();

  for _ in 1..rounds {
    let mut mac = prf.clone();
    mac.update(&u);
    u = mac.finalize().into_bytes().to_vec();
    out.iter_mut().zip(&u).for_each(|(o, b)| *o ^= b);
  }

  Ok(out)
}

pub fn hash_password(password: &str) -> Result<String> {
  let salt: [u8; 16] = rand::random();
  let hash = derive(password.as_bytes(), &salt, ROUNDS)?;
  Ok(format!("{SCHEME}${ROUNDS}${}${}", hex::encode(salt), hex::encode(hash)))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
  let parts: Vec<&str> = stored.split('$').collect();
  let [scheme, rounds, salt, hash] = parts.as_slice() else {
    return false;
  };

  if *scheme != SCHEME {
    return false;
  }

  let (Ok(rounds), Ok(salt), Ok(expected)) =
    (rounds.parse::<u32>(), hex::decode(salt), hex::decode(hash))
  else {
    return false;
  };

  match derive(password.as_bytes(), &salt, rounds) {
    Ok(actual) => {
      actual.len() == expected.len()
        && actual.iter().zip(&expected).fold(0u8, |acc, (a, b)| acc | (a ^ b))
          == 0
    }
    Err(_) => false,
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
  pub sub: i64,
  pub role: UserRole,
  pub iat: usize,
  pub exp: usize,
}

pub struct Auth<'a> {
  db: &'a DatabaseConnection,
  config: &'a Config,
}

impl<'a> Auth<'a> {
  pub fn new(db: &'a DatabaseConnection, config: &'a Config) -> Self {
    Self { db, config }
  }

  pub fn issue_token(&self, user: &user::Model) -> Result<String> {
    let iat = Utc::now().timestamp() as usize;
    let claims = Claims {
      sub: user.id,
      role: user.role,
      iat,
      exp: iat + self.config.token_ttl.as_secs() as usize,
    };

    Ok(jsonwebtoken::encode(
      &Header::default(),
      &claims,
      &EncodingKey::from_secret(self.config.secret.as_bytes()),
    )?)
  }

  pub fn verify_token(&self, token: &str) -> Result<Claims> {
    let data = jsonwebtoken::decode::<Claims>(
      token,
      &DecodingKey::from_secret(self.config.secret.as_bytes()),
      &Validation::default(),
    )?;
    Ok(data.claims)
  }

  /// Resolve a bearer token to a live, non-suspended account.
  pub async fn authenticate(&self, token: &str) -> Result<user::Model> {
    let claims = self.verify_token(token)?;
    let user = user::Entity::find_by_id(claims.sub)
      .one(self.db)
      .await?
      .ok_or(Error::Unauthorized)?;

    if user.is_suspended {
      return Err(Error::Suspended);
    }

    Ok(user)
  }

  pub async fn register(
    &self,
    email: &str,
    display_name: &str,
    password: &str,
    referral_code: Option<&str>,
  ) -> Result<(user::Model, String)> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 3 {
      return Err(Error::InvalidArgs("Invalid email address".into()));
    }
    if password.chars().count() < MIN_PASSWORD {
      return Err(Error::InvalidArgs(format!(
        "Password must be at least {MIN_PASSWORD} characters"
      )));
    }

    let display_name = match display_name.trim() {
      "" => email.split('@').next().unwrap_or_default().to_string(),
      name => name.to_string(),
    };

    if user::Entity::find()
      .filter(user::Column::Email.eq(&email))
      .one(self.db)
      .await?
      .is_some()
    {
      return Err(Error::EmailTaken);
    }

    let referred_by = match referral_code.map(str::trim).filter(|c| !c.is_empty())
    {
      Some(code) => Some(
        user::Entity::find()
          .filter(user::Column::ReferralCode.eq(code.to_uppercase()))
          .one(self.db)
          .await?
          .ok_or(Error::ReferralNotFound)?
          .id,
      ),
      None => None,
    };

    let role = if self.config.superadmin_email.as_deref() == Some(email.as_str())
    {
      info!("Bootstrapping super admin {}", email);
      UserRole::SuperAdmin
    } else {
      UserRole::User
    };

    let user = user::ActiveModel {
      id: NotSet,
      email: Set(email),
      display_name: Set(display_name),
      password_hash: Set(hash_password(password)?),
      role: Set(role),
      is_suspended: Set(false),
      balance: Set(0),
      referral_code: Set(utils::referral_code()),
      referred_by: Set(referred_by),
      commission_rate: Set(self.config.default_commission_rate),
      referral_sales: Set(0),
      referral_earnings: Set(0),
      created_at: Set(utils::now()),
      last_login_at: Set(None),
    }
    .insert(self.db)
    .await?;

    info!("Registered user {} (referred by {:?})", user.id, referred_by);

    let token = self.issue_token(&user)?;
    Ok((user, token))
  }

  pub async fn login(
    &self,
    email: &str,
    password: &str,
  ) -> Result<(user::Model, String)> {
    let user = user::Entity::find()
      .filter(user::Column::Email.eq(email.trim().to_lowercase()))
      .one(self.db)
      .await?
      .ok_or(Error::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash) {
      return Err(Error::InvalidCredentials);
    }
    if user.is_suspended {
      return Err(Error::Suspended);
    }

    let user = user::ActiveModel {
      last_login_at: Set(Some(utils::now())),
      ..user.into()
    }
    .update(self.db)
    .await?;

    let token = self.issue_token(&user)?;
    Ok((user, token))
  }
}
