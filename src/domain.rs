//! Domain models: the denormalized quiz tree handed to authoring and quiz-taking code.
//!
//! Question and answer order is the array order; `order_index` mirrors it and is
//! re-derived whenever the tree is turned back into records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A quiz with its questions (ordered) and personality types (declaration order).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
  #[serde(default)] pub id: String,
  #[serde(default)] pub owner_id: String,
  pub title: String,
  pub description: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cover_image_url: Option<String>,
  #[serde(default)] pub is_published: bool,
  #[serde(default)] pub slug: String,
  #[serde(default)] pub created_at: DateTime<Utc>,
  #[serde(default)] pub updated_at: DateTime<Utc>,
  #[serde(default)] pub total_takes: u64,
  #[serde(default)] pub questions: Vec<Question>,
  #[serde(default)] pub personality_types: Vec<PersonalityType>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  #[serde(default)] pub id: String,
  pub text: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
  #[serde(default)] pub order_index: u32,
  #[serde(default)] pub answers: Vec<Answer>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
  #[serde(default)] pub id: String,
  pub text: String,
  /// Id of the personality type this answer scores toward.
  pub personality_type: String,
  pub weight: f64,
  #[serde(default)] pub order_index: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityType {
  #[serde(default)] pub id: String,
  pub name: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub color: String,
  #[serde(default)] pub icon: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub result_image_url: Option<String>,
}

/// One (question, chosen answer) pair collected while taking a quiz. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
  pub question_id: String,
  pub answer_id: String,
}

/// Authenticated identity as reported by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: String,
  #[serde(default)]
  pub email: Option<String>,
}

impl Quiz {
  pub fn question(&self, id: &str) -> Option<&Question> {
    self.questions.iter().find(|q| q.id == id)
  }

  pub fn personality_type(&self, id: &str) -> Option<&PersonalityType> {
    self.personality_types.iter().find(|t| t.id == id)
  }
}

impl Question {
  pub fn answer(&self, id: &str) -> Option<&Answer> {
    self.answers.iter().find(|a| a.id == id)
  }
}
