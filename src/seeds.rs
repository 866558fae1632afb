//! Built-in content for the in-memory backend: one demo quiz plus any import
//! documents listed in the config bank.

use chrono::Utc;
use tracing::{error, info};

use crate::builder::{AnswerPatch, PersonalityTypePatch, QuizDraft};
use crate::domain::Quiz;
use crate::ids::IdGen;

pub const DEMO_OWNER: &str = "demo";

/// "What's Your Leadership Style?" with four types and two questions.
pub fn demo_quiz(ids: &dyn IdGen) -> Quiz {
  let mut d = QuizDraft::new();
  d.title = "What's Your Leadership Style?".into();
  d.description = "Discover your unique approach to leading teams and making decisions.".into();
  d.is_published = true;

  let types = [
    ("The Analytical Leader", "You excel at making data-driven decisions and creating systematic approaches to challenges.", "BarChart3"),
    ("The Visionary Leader", "You inspire others with your creative thinking and ability to see the big picture.", "Lightbulb"),
    ("The Team Builder", "You bring out the best in others through empathy and inclusive decision-making.", "Users"),
    ("The Action-Oriented Leader", "You thrive in dynamic environments and excel at making quick, effective decisions.", "Zap"),
  ];
  let type_ids: Vec<String> = types
    .iter()
    .map(|(name, description, icon)| {
      let id = d.add_personality_type(*name, ids);
      d.update_personality_type(&id, PersonalityTypePatch {
        description: Some(description.to_string()),
        icon: Some(icon.to_string()),
        ..Default::default()
      });
      id
    })
    .collect();

  let questions = [
    ("When facing a difficult decision, you typically:", [
      "Analyze all data thoroughly before deciding",
      "Trust your gut instinct",
      "Consult with your team first",
      "Make quick decisions and adapt as needed",
    ]),
    ("Your ideal work environment is:", [
      "Structured with clear processes",
      "Creative and flexible",
      "Team-oriented and collaborative",
      "Fast-paced and dynamic",
    ]),
  ];
  for (text, answers) in questions {
    let q = d.add_question(text, ids);
    for (answer, type_id) in answers.iter().zip(&type_ids) {
      if let Some(a) = d.add_answer(&q, *answer, ids) {
        d.update_answer(&q, &a, AnswerPatch { personality_type: Some(type_id.clone()), ..Default::default() });
      }
    }
  }

  let now = Utc::now();
  let slug = d.effective_slug();
  let mut quiz = d.into_quiz(DEMO_OWNER, now).unwrap_or_else(|e| {
    error!(target: "quiz", error = %e, "Demo quiz failed validation");
    Quiz { title: "Demo".into(), slug, ..Default::default() }
  });
  quiz.id = ids.fresh_id();
  quiz
}

/// Load bank documents through the import path; broken ones are logged and skipped.
pub fn bank_quizzes(paths: &[String], ids: &dyn IdGen) -> Vec<Quiz> {
  let now = Utc::now();
  let mut out = Vec::new();
  for path in paths {
    let raw = match std::fs::read_to_string(path) {
      Ok(s) => s,
      Err(e) => {
        error!(target: "quiz", %path, error = %e, "Failed to read bank document");
        continue;
      }
    };
    let mut d = QuizDraft::new();
    if let Err(e) = d.apply_import(&raw, ids) {
      error!(target: "quiz", %path, error = %e, "Skipping bank document");
      continue;
    }
    d.is_published = true;
    match d.into_quiz(DEMO_OWNER, now) {
      Ok(mut quiz) => {
        quiz.id = ids.fresh_id();
        info!(target: "quiz", %path, slug = %quiz.slug, "Loaded bank quiz");
        out.push(quiz);
      }
      Err(e) => error!(target: "quiz", %path, error = %e, "Skipping invalid bank quiz"),
    }
  }
  out
}
