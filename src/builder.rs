//! Authoring state for the quiz editor.
//!
//! A `QuizDraft` is what clients send when saving and what an import produces. The
//! editing operations mirror what an editor UI needs; `validate` is the gate every save
//! goes through.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{Answer, PersonalityType, Question, Quiz};
use crate::error::{ImportError, ValidationError};
use crate::ids::IdGen;
use crate::import::import_quiz;
use crate::transform::check_references;
use crate::util::{is_valid_slug, slugify};

pub const PALETTE_COLORS: [&str; 6] = ["#3B82F6", "#8B5CF6", "#14B8A6", "#F59E0B", "#EF4444", "#10B981"];
pub const PALETTE_ICONS: [&str; 6] = ["Star", "Heart", "Lightbulb", "Shield", "Zap", "Crown"];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizDraft {
    /// Set when editing a stored quiz.
    #[serde(default)]
    pub quiz_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub personality_types: Vec<PersonalityType>,
}

/// Partial update for an answer; `None` leaves the field alone.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerPatch {
    pub text: Option<String>,
    pub personality_type: Option<String>,
    pub weight: Option<f64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalityTypePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

impl QuizDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start editing a stored quiz.
    pub fn from_quiz(quiz: &Quiz) -> Self {
        Self {
            quiz_id: Some(quiz.id.clone()),
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            slug: quiz.slug.clone(),
            cover_image_url: quiz.cover_image_url.clone(),
            is_published: quiz.is_published,
            questions: quiz.questions.clone(),
            personality_types: quiz.personality_types.clone(),
        }
    }

    fn question_mut(&mut self, question_id: &str) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == question_id)
    }

    pub fn add_question(&mut self, text: impl Into<String>, ids: &dyn IdGen) -> String {
        let id = ids.fresh_id();
        self.questions.push(Question {
            id: id.clone(),
            text: text.into(),
            image_url: None,
            order_index: self.questions.len() as u32,
            answers: Vec::new(),
        });
        id
    }

    pub fn update_question_text(&mut self, question_id: &str, text: impl Into<String>) -> bool {
        match self.question_mut(question_id) {
            Some(q) => {
                q.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn set_question_image(&mut self, question_id: &str, url: Option<String>) -> bool {
        match self.question_mut(question_id) {
            Some(q) => {
                q.image_url = url;
                true
            }
            None => false,
        }
    }

    pub fn remove_question(&mut self, question_id: &str) -> bool {
        let before = self.questions.len();
        self.questions.retain(|q| q.id != question_id);
        before != self.questions.len()
    }

    /// Move a question to a new position; order indices follow on save.
    pub fn move_question(&mut self, from: usize, to: usize) -> bool {
        if from >= self.questions.len() || to >= self.questions.len() {
            return false;
        }
        let q = self.questions.remove(from);
        self.questions.insert(to, q);
        true
    }

    /// New answers score 1 toward the first declared type.
    pub fn add_answer(&mut self, question_id: &str, text: impl Into<String>, ids: &dyn IdGen) -> Option<String> {
        let default_type = self.personality_types.first().map(|t| t.id.clone()).unwrap_or_default();
        let q = self.question_mut(question_id)?;
        let id = ids.fresh_id();
        q.answers.push(Answer {
            id: id.clone(),
            text: text.into(),
            personality_type: default_type,
            weight: 1.0,
            order_index: q.answers.len() as u32,
        });
        Some(id)
    }

    pub fn update_answer(&mut self, question_id: &str, answer_id: &str, patch: AnswerPatch) -> bool {
        let Some(a) = self
            .question_mut(question_id)
            .and_then(|q| q.answers.iter_mut().find(|a| a.id == answer_id))
        else {
            return false;
        };
        if let Some(text) = patch.text {
            a.text = text;
        }
        if let Some(t) = patch.personality_type {
            a.personality_type = t;
        }
        if let Some(w) = patch.weight {
            a.weight = w;
        }
        true
    }

    pub fn remove_answer(&mut self, question_id: &str, answer_id: &str) -> bool {
        match self.question_mut(question_id) {
            Some(q) => {
                let before = q.answers.len();
                q.answers.retain(|a| a.id != answer_id);
                before != q.answers.len()
            }
            None => false,
        }
    }

    /// Adds a type with the next palette color and icon.
    pub fn add_personality_type(&mut self, name: impl Into<String>, ids: &dyn IdGen) -> String {
        let n = self.personality_types.len();
        let id = ids.fresh_id();
        self.personality_types.push(PersonalityType {
            id: id.clone(),
            name: name.into(),
            description: String::new(),
            color: PALETTE_COLORS[n % PALETTE_COLORS.len()].to_string(),
            icon: PALETTE_ICONS[n % PALETTE_ICONS.len()].to_string(),
            result_image_url: None,
        });
        id
    }

    pub fn update_personality_type(&mut self, type_id: &str, patch: PersonalityTypePatch) -> bool {
        let Some(t) = self.personality_types.iter_mut().find(|t| t.id == type_id) else {
            return false;
        };
        if let Some(name) = patch.name {
            t.name = name;
        }
        if let Some(d) = patch.description {
            t.description = d;
        }
        if let Some(c) = patch.color {
            t.color = c;
        }
        if let Some(i) = patch.icon {
            t.icon = i;
        }
        true
    }

    pub fn set_result_image(&mut self, type_id: &str, url: Option<String>) -> bool {
        match self.personality_types.iter_mut().find(|t| t.id == type_id) {
            Some(t) => {
                t.result_image_url = url;
                true
            }
            None => false,
        }
    }

    /// Answers still pointing at a removed type are caught by `validate`.
    pub fn remove_personality_type(&mut self, type_id: &str) -> bool {
        let before = self.personality_types.len();
        self.personality_types.retain(|t| t.id != type_id);
        let removed = before != self.personality_types.len();
        if removed {
            let dangling = self
                .questions
                .iter()
                .flat_map(|q| q.answers.iter())
                .filter(|a| a.personality_type == type_id)
                .count();
            if dangling > 0 {
                warn!(target: "quiz", %type_id, dangling, "Removed personality type still referenced by answers");
            }
        }
        removed
    }

    /// Replace title, description, slug, types and questions from an import document.
    /// On error nothing is changed.
    pub fn apply_import(&mut self, raw: &str, ids: &dyn IdGen) -> Result<(), ImportError> {
        let imported = import_quiz(raw, ids)?;
        self.title = imported.title;
        self.description = imported.description;
        self.slug = imported.slug;
        self.personality_types = imported.personality_types;
        self.questions = imported.questions;
        info!(target: "quiz", questions = self.questions.len(), types = self.personality_types.len(), "Draft replaced from import");
        Ok(())
    }

    /// Slug to save under: the explicit one, or one derived from the title.
    pub fn effective_slug(&self) -> String {
        let s = self.slug.trim();
        if s.is_empty() { slugify(&self.title) } else { s.to_string() }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.description.trim().is_empty() {
            return Err(ValidationError::MissingField("description"));
        }
        if self.questions.is_empty() {
            return Err(ValidationError::NoQuestions);
        }
        if self.personality_types.is_empty() {
            return Err(ValidationError::NoPersonalityTypes);
        }
        if self.personality_types.iter().any(|t| t.name.trim().is_empty()) {
            return Err(ValidationError::MissingField("personality type name"));
        }
        if self.questions.iter().any(|q| q.text.trim().is_empty()) {
            return Err(ValidationError::MissingField("question text"));
        }
        if self.is_published {
            if let Some(q) = self.questions.iter().find(|q| q.answers.is_empty()) {
                return Err(ValidationError::QuestionWithoutAnswers { question_id: q.id.clone() });
            }
        }
        let slug = self.effective_slug();
        if !is_valid_slug(&slug) {
            return Err(ValidationError::InvalidSlug(slug));
        }
        check_references(&self.to_quiz_unchecked(String::new(), DateTime::<Utc>::default()))
    }

    fn to_quiz_unchecked(&self, owner_id: String, now: DateTime<Utc>) -> Quiz {
        Quiz {
            id: self.quiz_id.clone().unwrap_or_default(),
            owner_id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            cover_image_url: self.cover_image_url.clone(),
            is_published: self.is_published,
            slug: self.effective_slug(),
            created_at: now,
            updated_at: now,
            total_takes: 0,
            questions: self.questions.clone(),
            personality_types: self.personality_types.clone(),
        }
    }

    /// Validated quiz tree for saving. Timestamps and take count are set by the caller
    /// when an existing record is being updated.
    pub fn into_quiz(self, owner_id: &str, now: DateTime<Utc>) -> Result<Quiz, ValidationError> {
        self.validate()?;
        Ok(self.to_quiz_unchecked(owner_id.to_string(), now))
    }
}
