//! Loading service configuration from TOML (path in QUIZ_CONFIG_PATH).
//!
//! Every section is optional; a missing or broken file falls back to defaults.
//!
//! ```toml
//! bank = ["quizzes/seasons.json"]
//!
//! [scoring]
//! reject_empty_responses = false
//!
//! [storage]
//! bucket = "quiz-images"
//! public_base_url = "http://localhost:3000/blobs"
//!
//! [[dev_users]]
//! token = "dev-token"
//! id = "dev-user"
//! email = "dev@example.com"
//! ```

use serde::Deserialize;
use tracing::{error, info};

use crate::scoring::EmptyPolicy;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub scoring: ScoringConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  /// Bearer tokens accepted by the in-memory identity provider.
  #[serde(default)]
  pub dev_users: Vec<DevUser>,
  /// Import documents to publish at startup (in-memory backend only).
  #[serde(default)]
  pub bank: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ScoringConfig {
  /// Treat a session without responses as an error instead of returning the
  /// first-declared personality type.
  #[serde(default)]
  pub reject_empty_responses: bool,
}

impl ScoringConfig {
  pub fn empty_policy(&self) -> EmptyPolicy {
    if self.reject_empty_responses { EmptyPolicy::Reject } else { EmptyPolicy::FirstDeclared }
  }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageConfig {
  #[serde(default = "default_bucket")]
  pub bucket: String,
  #[serde(default = "default_public_base_url")]
  pub public_base_url: String,
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self { bucket: default_bucket(), public_base_url: default_public_base_url() }
  }
}

fn default_bucket() -> String { "quiz-images".into() }
fn default_public_base_url() -> String { "http://localhost:3000/blobs".into() }

#[derive(Clone, Debug, Deserialize)]
pub struct DevUser {
  pub token: String,
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

pub fn parse_config(s: &str) -> Result<AppConfig, toml::de::Error> {
  toml::from_str::<AppConfig>(s)
}

/// Read QUIZ_CONFIG_PATH if set. On any IO/parse error, logs and returns defaults.
pub fn load_config_from_env() -> AppConfig {
  let Ok(path) = std::env::var("QUIZ_CONFIG_PATH") else {
    return AppConfig::default();
  };
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "persona_quiz", %path, bank = cfg.bank.len(), dev_users = cfg.dev_users.len(), "Loaded config (TOML)");
        cfg
      }
      Err(e) => {
        error!(target: "persona_quiz", %path, error = %e, "Failed to parse TOML config");
        AppConfig::default()
      }
    },
    Err(e) => {
      error!(target: "persona_quiz", %path, error = %e, "Failed to read TOML config file");
      AppConfig::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn full_config_parses() {
    let cfg = parse_config(
      r#"
      bank = ["a.json", "b.json"]
      [scoring]
      reject_empty_responses = true
      [storage]
      bucket = "covers"
      [[dev_users]]
      token = "t"
      id = "u"
      "#,
    )
    .expect("config");
    assert_eq!(cfg.bank.len(), 2);
    assert_eq!(cfg.scoring.empty_policy(), EmptyPolicy::Reject);
    assert_eq!(cfg.storage.bucket, "covers");
    assert_eq!(cfg.storage.public_base_url, "http://localhost:3000/blobs");
    assert_eq!(cfg.dev_users[0].email, None);
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_config("").expect("config");
    assert_eq!(cfg.scoring.empty_policy(), EmptyPolicy::FirstDeclared);
    assert_eq!(cfg.storage.bucket, "quiz-images");
    assert!(cfg.bank.is_empty());
  }
}
