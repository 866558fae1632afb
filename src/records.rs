//! Normalized record shapes, one per stored record kind.
//!
//! Field names match the storage columns (snake_case). These types never leave the
//! backend/transform boundary; everything else works on the `domain` tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const QUIZZES: &str = "quizzes";
pub const QUESTIONS: &str = "questions";
pub const ANSWERS: &str = "answers";
pub const PERSONALITY_TYPES: &str = "personality_types";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuizRecord {
  pub id: String,
  pub owner_id: String,
  pub title: String,
  pub description: String,
  #[serde(default)]
  pub cover_image_url: Option<String>,
  pub is_published: bool,
  pub slug: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub total_takes: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionRecord {
  pub id: String,
  pub quiz_id: String,
  pub text: String,
  #[serde(default)]
  pub image_url: Option<String>,
  pub order_index: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
  pub id: String,
  pub question_id: String,
  pub text: String,
  pub weight: f64,
  pub order_index: u32,
  pub personality_type_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTypeRecord {
  pub id: String,
  pub quiz_id: String,
  pub name: String,
  pub description: String,
  pub color: String,
  pub icon: String,
  #[serde(default)]
  pub result_image_url: Option<String>,
  /// Declaration order; keeps the scoring tie-break stable across reloads.
  #[serde(default)]
  pub order_index: u32,
}

/// Everything needed to persist one quiz.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordSet {
  pub quiz: QuizRecord,
  pub personality_types: Vec<PersonalityTypeRecord>,
  pub questions: Vec<QuestionRecord>,
  pub answers: Vec<AnswerRecord>,
}

/// Gives generic store code access to the primary key.
pub trait Keyed {
  fn key(&self) -> &str;
}

impl Keyed for QuizRecord {
  fn key(&self) -> &str { &self.id }
}
impl Keyed for QuestionRecord {
  fn key(&self) -> &str { &self.id }
}
impl Keyed for AnswerRecord {
  fn key(&self) -> &str { &self.id }
}
impl Keyed for PersonalityTypeRecord {
  fn key(&self) -> &str { &self.id }
}
