//! Generative-AI gateway.
//!
//! Hosted backend speaks the Gemini `generateContent` REST format:
//! https://ai.google.dev/api/generate-content

use async_trait::async_trait;
use json::{Value, json};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{config::AiConfig, entity::Game, prelude::*};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
  pub role: Role,
  pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
  pub system: Option<String>,
  pub prompt: String,
  pub history: Vec<Turn>,
  /// JSON schema the answer must follow; plain text when absent.
  pub schema: Option<Value>,
  pub temperature: f32,
  /// Overrides the configured model.
  pub model: Option<String>,
}

#[async_trait]
pub trait Gateway: Send + Sync {
  async fn generate(&self, request: GenerateRequest) -> Result<String>;

  fn is_enabled(&self) -> bool {
    true
  }
}

/// Stand-in when no API key is configured.
pub struct Disabled;

#[async_trait]
impl Gateway for Disabled {
  async fn generate(&self, _: GenerateRequest) -> Result<String> {
    Err(Error::GatewayUnavailable)
  }

  fn is_enabled(&self) -> bool {
    false
  }
}

#[derive(Debug, Deserialize)]
struct Part {
  text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  content: Option<Content>,
  finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
  code: Option<i32>,
  message: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  error: Option<ApiError>,
}

#[derive(Clone)]
pub struct Hosted {
  client: Client,
  base_url: String,
  api_key: String,
  model: String,
}

impl Hosted {
  pub fn new(config: &AiConfig, api_key: String) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .build()
      .map_err(|e| Error::Internal(format!("http client: {e}")))?;

    Ok(Self {
      client,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      api_key,
      model: config.model.clone(),
    })
  }

  fn body(request: &GenerateRequest) -> Value {
    let mut contents = request
      .history
      .iter()
      .map(|turn| json!({ "role": turn.role, "parts": [{ "text": turn.text }] }))
      .collect::<Vec<_>>();
    contents.push(json!({ "role": "user", "parts": [{ "text": request.prompt }] }));

    let mut generation = json!({ "temperature": request.temperature });
    if let Some(schema) = &request.schema {
      generation["responseMimeType"] = json!("application/json");
      generation["responseSchema"] = schema.clone();
    }

    let mut body = json!({
      "contents": contents,
      "generationConfig": generation,
    });
    if let Some(system) = &request.system {
      body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
    }

    body
  }
}

#[async_trait]
impl Gateway for Hosted {
  async fn generate(&self, request: GenerateRequest) -> Result<String> {
    let model = request.model.as_deref().unwrap_or(&self.model);
    let url = format!("{}/models/{}:generateContent", self.base_url, model);

    let response = self
      .client
      .post(&url)
      .query(&[("key", &self.api_key)])
      .json(&Self::body(&request))
      .send()
      .await
      .map_err(|e| Error::Gateway(format!("Request failed: {e}")))?;

    let status = response.status();
    let api: ApiResponse = response
      .json()
      .await
      .map_err(|e| Error::Gateway(format!("Failed to parse response: {e}")))?;

    if let Some(err) = api.error {
      return Err(Error::Gateway(format!(
        "{} ({})",
        err.message,
        err.code.unwrap_or(status.as_u16() as i32)
      )));
    }
    if !status.is_success() {
      return Err(Error::Gateway(format!("HTTP {status}")));
    }

    let candidate = api
      .candidates
      .into_iter()
      .next()
      .ok_or_else(|| Error::Gateway("Empty result".into()))?;

    let text = candidate
      .content
      .into_iter()
      .flat_map(|c| c.parts)
      .filter_map(|p| p.text)
      .collect::<String>();

    if text.trim().is_empty() {
      return Err(Error::Gateway(format!(
        "No text in answer (finish reason: {})",
        candidate.finish_reason.as_deref().unwrap_or("unknown")
      )));
    }

    Ok(text)
  }
}

pub fn from_config(config: &AiConfig) -> Result<Arc<dyn Gateway>> {
  match &config.api_key {
    Some(key) => {
      info!("AI gateway enabled ({})", config.model);
      Ok(Arc::new(Hosted::new(config, key.clone())?))
    }
    None => {
      warn!("AI_API_KEY not set, AI gateway disabled");
      Ok(Arc::new(Disabled))
    }
  }
}

/// Response schema (OpenAPI subset) the model must fill for `game`.
pub fn response_schema(game: Game) -> Value {
  let int = |min: u32, max: u32| json!({ "type": "INTEGER", "minimum": min, "maximum": max });

  let (properties, required) = match game {
    Game::Aviator => (
      json!({
        "cashout": { "type": "NUMBER", "minimum": 1.01, "maximum": 100.0 },
        "confidence": int(0, 100),
      }),
      json!(["cashout", "confidence"]),
    ),
    Game::Mines => (
      json!({ "safe_tiles": { "type": "ARRAY", "items": int(0, 24) } }),
      json!(["safe_tiles"]),
    ),
    Game::Dice => (
      json!({
        "target": int(2, 98),
        "over": { "type": "BOOLEAN" },
        "confidence": int(0, 100),
      }),
      json!(["target", "over", "confidence"]),
    ),
    Game::Roulette => (
      json!({
        "numbers": { "type": "ARRAY", "items": int(0, 36), "maxItems": 6 },
        "color": { "type": "STRING", "enum": ["red", "black", "green"] },
      }),
      json!(["numbers", "color"]),
    ),
  };

  json!({ "type": "OBJECT", "properties": properties, "required": required })
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn request_body_shape() {
    let request = GenerateRequest {
      system: Some("be brief".into()),
      prompt: "hello".into(),
      history: vec![
        Turn { role: Role::User, text: "hi".into() },
        Turn { role: Role::Model, text: "hey".into() },
      ],
      schema: Some(response_schema(Game::Dice)),
      temperature: 0.4,
      model: None,
    };

    let body = Hosted::body(&request);
    assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
    assert_eq!(body["contents"].as_array().unwrap().len(), 3);
    assert_eq!(body["contents"][1]["role"], "model");
    assert_eq!(body["contents"][2]["parts"][0]["text"], "hello");
    assert_eq!(
      body["generationConfig"]["responseMimeType"],
      "application/json"
    );
    assert_eq!(
      body["generationConfig"]["responseSchema"]["required"][0],
      "target"
    );
  }

  #[test]
  fn plain_text_without_schema() {
    let body = Hosted::body(&GenerateRequest {
      prompt: "hello".into(),
      ..Default::default()
    });
    assert!(body.get("systemInstruction").is_none());
    assert!(body["generationConfig"].get("responseSchema").is_none());
  }

  #[tokio::test]
  async fn disabled_gateway_errors() {
    let gateway = Disabled;
    assert!(!gateway.is_enabled());
    assert!(matches!(
      gateway.generate(GenerateRequest::default()).await,
      Err(Error::GatewayUnavailable)
    ));
  }

  #[test]
  fn schemas_cover_every_game() {
    for game in Game::ALL {
      let schema = response_schema(game);
      assert_eq!(schema["type"], "OBJECT");
      assert!(!schema["required"].as_array().unwrap().is_empty());
    }
  }
}
