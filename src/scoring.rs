//! Scoring: sum answer weights per personality type and pick the winner.
//!
//! Ties go to the type declared first on the quiz. Responses that no longer resolve
//! against the quiz are skipped and reported, never fatal.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::domain::{PersonalityType, Quiz, QuizResponse};
use crate::error::ScoringError;

/// How to treat a session with no responses at all.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmptyPolicy {
  /// Every type scores zero, so the first-declared type wins.
  #[default]
  FirstDeclared,
  Reject,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeScore {
  pub type_id: String,
  pub score: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
  UnknownQuestion,
  UnknownAnswer,
  UnresolvedPersonalityType,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skipped {
  pub response: QuizResponse,
  pub reason: SkipReason,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSheet {
  pub winner: PersonalityType,
  /// One entry per personality type, in declaration order.
  pub scores: Vec<TypeScore>,
  pub counted: usize,
  pub skipped: Vec<Skipped>,
}

/// Running totals, initialised to zero for every declared type.
pub fn tally(quiz: &Quiz, responses: &[QuizResponse]) -> (Vec<TypeScore>, Vec<Skipped>) {
  let mut scores: Vec<TypeScore> = quiz
    .personality_types
    .iter()
    .map(|t| TypeScore { type_id: t.id.clone(), score: 0.0 })
    .collect();
  let slot: HashMap<&str, usize> = quiz
    .personality_types
    .iter()
    .enumerate()
    .map(|(i, t)| (t.id.as_str(), i))
    .collect();

  let mut skipped = Vec::new();
  for r in responses {
    let reason = match quiz.question(&r.question_id) {
      None => Some(SkipReason::UnknownQuestion),
      Some(q) => match q.answer(&r.answer_id) {
        None => Some(SkipReason::UnknownAnswer),
        Some(a) => match slot.get(a.personality_type.as_str()) {
          Some(&i) => {
            scores[i].score += a.weight;
            None
          }
          None => Some(SkipReason::UnresolvedPersonalityType),
        },
      },
    };
    if let Some(reason) = reason {
      warn!(target: "scoring", quiz_id = %quiz.id, question_id = %r.question_id, answer_id = %r.answer_id, ?reason, "Skipping stale response");
      skipped.push(Skipped { response: r.clone(), reason });
    }
  }
  (scores, skipped)
}

#[instrument(level = "debug", skip_all, fields(quiz_id = %quiz.id, responses = responses.len()))]
pub fn score_quiz(quiz: &Quiz, responses: &[QuizResponse], policy: EmptyPolicy) -> Result<ScoreSheet, ScoringError> {
  if quiz.personality_types.is_empty() {
    return Err(ScoringError::NoPersonalityTypes);
  }
  if responses.is_empty() && policy == EmptyPolicy::Reject {
    return Err(ScoringError::NoResponses);
  }

  let (scores, skipped) = tally(quiz, responses);

  // Strictly greater only: on a tie the earlier-declared type keeps the lead.
  let mut best = 0;
  for (i, s) in scores.iter().enumerate().skip(1) {
    if s.score > scores[best].score {
      best = i;
    }
  }

  let winner = quiz.personality_types[best].clone();
  debug!(target: "scoring", quiz_id = %quiz.id, winner = %winner.id, skipped = skipped.len(), "Scored quiz");
  Ok(ScoreSheet {
    winner,
    counted: responses.len() - skipped.len(),
    scores,
    skipped,
  })
}
