//! Quiz import: external JSON documents reference personality types by *name*; this
//! module validates the document and rewrites it into the id-keyed quiz shape.
//!
//! Accepted document:
//!
//! ```json
//! { "title": "...", "description": "...", "slug": "optional",
//!   "questions": [{ "text": "...", "imageUrl": "optional",
//!                   "answers": [{ "text": "...", "personalityType": "<name>", "weight": 2 }] }],
//!   "personalityTypes": [{ "name": "...", "description": "...", "color": "#3B82F6",
//!                          "icon": "Star", "resultImageUrl": "optional" }] }
//! ```
//!
//! Identifiers and ordering hints inside the document are ignored; everything gets a
//! fresh id and an order index equal to its position.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::domain::{Answer, PersonalityType, Question};
use crate::error::ImportError;
use crate::ids::IdGen;
use crate::util::{is_valid_slug, slugify, trunc_for_log};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDocument {
  pub title: String,
  pub description: String,
  #[serde(default)] pub slug: Option<String>,
  pub questions: Vec<ImportQuestion>,
  pub personality_types: Vec<ImportPersonalityType>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportQuestion {
  pub text: String,
  #[serde(default)] pub image_url: Option<String>,
  #[serde(default)] pub answers: Vec<ImportAnswer>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportAnswer {
  pub text: String,
  pub personality_type: String,
  pub weight: f64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPersonalityType {
  pub name: String,
  #[serde(default)] pub description: String,
  #[serde(default)] pub color: String,
  #[serde(default)] pub icon: String,
  #[serde(default)] pub result_image_url: Option<String>,
}

/// Result of a successful import, ready to replace authoring state.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportedQuiz {
  pub title: String,
  pub description: String,
  pub slug: String,
  pub personality_types: Vec<PersonalityType>,
  pub questions: Vec<Question>,
}

/// Top-level shape check. Any miss rejects the whole document.
fn check_shape(value: &Value) -> Result<(), ImportError> {
  let obj = value
    .as_object()
    .ok_or_else(|| ImportError::InvalidFormat("document must be a JSON object".into()))?;
  let expect = |key: &str, ok: fn(&Value) -> bool, kind: &str| match obj.get(key) {
    Some(v) if ok(v) => Ok(()),
    Some(_) => Err(ImportError::InvalidFormat(format!("'{key}' must be {kind}"))),
    None => Err(ImportError::InvalidFormat(format!("missing '{key}'"))),
  };
  expect("title", Value::is_string, "a string")?;
  expect("description", Value::is_string, "a string")?;
  expect("questions", Value::is_array, "an array")?;
  expect("personalityTypes", Value::is_array, "an array")?;
  Ok(())
}

/// Parse a raw document into the typed shape without touching identifiers.
pub fn parse_document(raw: &str) -> Result<ImportDocument, ImportError> {
  let value: Value = serde_json::from_str(raw)
    .map_err(|e| ImportError::InvalidFormat(format!("not JSON: {e}")))?;
  document_from_value(value)
}

pub fn document_from_value(value: Value) -> Result<ImportDocument, ImportError> {
  check_shape(&value)?;
  serde_json::from_value(value).map_err(|e| ImportError::InvalidFormat(e.to_string()))
}

/// Assign ids, resolve answer type names to those ids, and derive order indices.
/// Fails on the first name that does not resolve.
#[instrument(level = "info", skip_all, fields(title = %trunc_for_log(&doc.title, 60), types = doc.personality_types.len(), questions = doc.questions.len()))]
pub fn reconcile(doc: ImportDocument, ids: &dyn IdGen) -> Result<ImportedQuiz, ImportError> {
  let slug = match doc.slug.as_deref().map(str::trim) {
    Some(s) if !s.is_empty() => {
      if !is_valid_slug(s) {
        return Err(ImportError::InvalidSlug(s.to_string()));
      }
      s.to_string()
    }
    _ => slugify(&doc.title),
  };

  let mut by_name: HashMap<String, String> = HashMap::new();
  let mut personality_types = Vec::with_capacity(doc.personality_types.len());
  for t in doc.personality_types {
    let id = ids.fresh_id();
    if by_name.insert(t.name.clone(), id.clone()).is_some() {
      return Err(ImportError::DuplicatePersonalityType(t.name));
    }
    personality_types.push(PersonalityType {
      id,
      name: t.name,
      description: t.description,
      color: t.color,
      icon: t.icon,
      result_image_url: t.result_image_url,
    });
  }

  let mut questions = Vec::with_capacity(doc.questions.len());
  for (qi, q) in doc.questions.into_iter().enumerate() {
    let mut answers = Vec::with_capacity(q.answers.len());
    for (ai, a) in q.answers.into_iter().enumerate() {
      let type_id = by_name
        .get(&a.personality_type)
        .cloned()
        .ok_or_else(|| ImportError::UnknownPersonalityType(a.personality_type.clone()))?;
      answers.push(Answer {
        id: ids.fresh_id(),
        text: a.text,
        personality_type: type_id,
        weight: a.weight,
        order_index: ai as u32,
      });
    }
    questions.push(Question {
      id: ids.fresh_id(),
      text: q.text,
      image_url: q.image_url,
      order_index: qi as u32,
      answers,
    });
  }

  info!(target: "quiz", %slug, "Import reconciled");
  Ok(ImportedQuiz { title: doc.title, description: doc.description, slug, personality_types, questions })
}

/// Parse and reconcile in one step.
pub fn import_quiz(raw: &str, ids: &dyn IdGen) -> Result<ImportedQuiz, ImportError> {
  reconcile(parse_document(raw)?, ids)
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::ids::SequentialIds;

  pub(crate) const DOC: &str = r##"{
    "title": "Which Season Are You?",
    "description": "Four seasons, one you.",
    "questions": [
      { "text": "Pick a drink", "answers": [
        { "text": "Iced tea", "personalityType": "Summer", "weight": 2 },
        { "text": "Cocoa", "personalityType": "Winter", "weight": 3 }
      ]},
      { "text": "Pick a place", "imageUrl": "https://img/x.png", "answers": [
        { "text": "Beach", "personalityType": "Summer", "weight": 1.5 },
        { "text": "Cabin", "personalityType": "Winter", "weight": 1 }
      ]}
    ],
    "personalityTypes": [
      { "name": "Summer", "description": "Warm", "color": "#F59E0B", "icon": "Zap" },
      { "name": "Winter", "description": "Cool", "color": "#3B82F6", "icon": "Shield" }
    ]
  }"##;

  #[test]
  fn names_are_mapped_to_fresh_ids() {
    let q = import_quiz(DOC, &SequentialIds::default()).expect("import");
    assert_eq!(q.slug, "which-season-are-you");
    let summer = &q.personality_types[0];
    let winter = &q.personality_types[1];
    assert_eq!((summer.id.as_str(), winter.id.as_str()), ("id-1", "id-2"));
    assert_eq!(q.questions[0].answers[0].personality_type, summer.id);
    assert_eq!(q.questions[0].answers[1].personality_type, winter.id);
    assert_eq!(q.questions[1].answers[1].weight, 1.0);
    assert_eq!(q.questions[1].answers[0].weight, 1.5);
    assert_eq!(q.questions[1].order_index, 1);
    assert_eq!(q.questions[1].answers[1].order_index, 1);
    assert_eq!(q.questions[1].image_url.as_deref(), Some("https://img/x.png"));
  }

  #[test]
  fn missing_weight_is_a_format_error() {
    let doc = DOC.replacen(r#""personalityType": "Winter", "weight": 1 }"#, r#""personalityType": "Winter" }"#, 1);
    assert_ne!(doc, DOC);
    let err = import_quiz(&doc, &SequentialIds::default()).unwrap_err();
    assert!(matches!(err, ImportError::InvalidFormat(ref msg) if msg.contains("weight")), "{err:?}");
  }

  #[test]
  fn unknown_type_name_is_reported() {
    let doc = DOC.replacen("\"Cocoa\", \"personalityType\": \"Winter\"", "\"Cocoa\", \"personalityType\": \"Ghost\"", 1);
    let err = import_quiz(&doc, &SequentialIds::default()).unwrap_err();
    assert_eq!(err, ImportError::UnknownPersonalityType("Ghost".into()));
    assert!(err.to_string().contains("Ghost"));
  }

  #[test]
  fn missing_top_level_fields_are_format_errors() {
    for raw in [
      r#"[]"#,
      r#"{"description":"d","questions":[],"personalityTypes":[]}"#,
      r#"{"title":"t","description":"d","questions":{},"personalityTypes":[]}"#,
      r#"{"title":"t","description":"d","questions":[]}"#,
      r#"{"title":1,"description":"d","questions":[],"personalityTypes":[]}"#,
      "not json",
    ] {
      let err = import_quiz(raw, &SequentialIds::default()).unwrap_err();
      assert!(matches!(err, ImportError::InvalidFormat(_)), "{raw} -> {err:?}");
    }
  }

  #[test]
  fn malformed_nested_entries_are_format_errors() {
    let raw = r#"{"title":"t","description":"d","questions":[{"answers":[]}],"personalityTypes":[]}"#;
    assert!(matches!(import_quiz(raw, &SequentialIds::default()), Err(ImportError::InvalidFormat(_))));
  }

  #[test]
  fn duplicate_type_names_are_rejected() {
    let raw = r#"{"title":"t","description":"d","questions":[],
      "personalityTypes":[{"name":"A"},{"name":"A"}]}"#;
    assert_eq!(
      import_quiz(raw, &SequentialIds::default()).unwrap_err(),
      ImportError::DuplicatePersonalityType("A".into())
    );
  }

  #[test]
  fn explicit_slug_is_validated() {
    let ok = r#"{"title":"t","description":"d","slug":"my-quiz","questions":[],"personalityTypes":[]}"#;
    assert_eq!(import_quiz(ok, &SequentialIds::default()).expect("import").slug, "my-quiz");
    let bad = r#"{"title":"t","description":"d","slug":"My Quiz","questions":[],"personalityTypes":[]}"#;
    assert_eq!(
      import_quiz(bad, &SequentialIds::default()).unwrap_err(),
      ImportError::InvalidSlug("My Quiz".into())
    );
  }
}
