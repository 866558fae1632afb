//! One quiz-taking session: walks the questions in order and collects responses.
//! The session owns its responses; dropping it discards them.

use thiserror::Error;

use crate::domain::{Question, Quiz, QuizResponse};
use crate::error::ScoringError;
use crate::scoring::{score_quiz, EmptyPolicy, ScoreSheet};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
  #[error("quiz has no questions")]
  EmptyQuiz,
  #[error("session is already finished")]
  Finished,
  #[error("expected an answer to question {expected}, got {got}")]
  WrongQuestion { expected: String, got: String },
  #[error("answer {0} does not belong to the current question")]
  UnknownAnswer(String),
  #[error(transparent)]
  Scoring(#[from] ScoringError),
}

/// What happens after an answer is recorded.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
  Next { position: usize, question: Question },
  Finished(ScoreSheet),
}

#[derive(Debug)]
pub struct TakeSession {
  quiz: Quiz,
  responses: Vec<QuizResponse>,
  finished: bool,
  policy: EmptyPolicy,
}

impl TakeSession {
  pub fn start(quiz: Quiz, policy: EmptyPolicy) -> Result<Self, SessionError> {
    if quiz.questions.is_empty() {
      return Err(SessionError::EmptyQuiz);
    }
    Ok(Self { quiz, responses: Vec::new(), finished: false, policy })
  }

  pub fn quiz(&self) -> &Quiz { &self.quiz }

  pub fn total(&self) -> usize { self.quiz.questions.len() }

  /// Zero-based index of the question awaiting an answer.
  pub fn position(&self) -> usize { self.responses.len() }

  pub fn is_finished(&self) -> bool { self.finished }

  pub fn current(&self) -> Option<&Question> {
    if self.finished { None } else { self.quiz.questions.get(self.position()) }
  }

  pub fn answer(&mut self, question_id: &str, answer_id: &str) -> Result<Step, SessionError> {
    let current = self.current().ok_or(SessionError::Finished)?;
    if current.id != question_id {
      return Err(SessionError::WrongQuestion { expected: current.id.clone(), got: question_id.to_string() });
    }
    if current.answer(answer_id).is_none() {
      return Err(SessionError::UnknownAnswer(answer_id.to_string()));
    }

    self.responses.push(QuizResponse { question_id: question_id.to_string(), answer_id: answer_id.to_string() });

    match self.quiz.questions.get(self.position()) {
      Some(next) => Ok(Step::Next { position: self.position(), question: next.clone() }),
      None => {
        let sheet = score_quiz(&self.quiz, &self.responses, self.policy)?;
        self.finished = true;
        Ok(Step::Finished(sheet))
      }
    }
  }

  /// Undo the last response and return to its question. Returns the re-opened
  /// question together with the answer that had been chosen.
  pub fn back(&mut self) -> Option<(Question, String)> {
    if self.finished {
      return None;
    }
    let last = self.responses.pop()?;
    let q = self.quiz.questions.get(self.position())?.clone();
    Some((q, last.answer_id))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transform::tests::sample_quiz;

  #[test]
  fn walks_questions_and_scores_at_the_end() {
    let mut s = TakeSession::start(sample_quiz(), EmptyPolicy::default()).expect("start");
    assert_eq!(s.current().map(|q| q.id.as_str()), Some("q1"));
    match s.answer("q1", "a2").expect("step") {
      Step::Next { position, question } => {
        assert_eq!(position, 1);
        assert_eq!(question.id, "q2");
      }
      other => panic!("unexpected {other:?}"),
    }
    match s.answer("q2", "a3").expect("step") {
      Step::Finished(sheet) => {
        assert_eq!(sheet.winner.id, "B");
        assert_eq!(sheet.counted, 2);
      }
      other => panic!("unexpected {other:?}"),
    }
    assert!(s.is_finished());
    assert_eq!(s.answer("q2", "a3"), Err(SessionError::Finished));
  }

  #[test]
  fn rejects_out_of_order_and_foreign_answers() {
    let mut s = TakeSession::start(sample_quiz(), EmptyPolicy::default()).expect("start");
    assert!(matches!(s.answer("q2", "a3"), Err(SessionError::WrongQuestion { .. })));
    assert_eq!(s.answer("q1", "a3"), Err(SessionError::UnknownAnswer("a3".into())));
    assert_eq!(s.position(), 0);
  }

  #[test]
  fn back_reopens_previous_question() {
    let mut s = TakeSession::start(sample_quiz(), EmptyPolicy::default()).expect("start");
    assert!(s.back().is_none());
    s.answer("q1", "a1").expect("step");
    let (q, chosen) = s.back().expect("back");
    assert_eq!((q.id.as_str(), chosen.as_str()), ("q1", "a1"));
    assert_eq!(s.position(), 0);
  }

  #[test]
  fn empty_quiz_cannot_be_taken() {
    let mut quiz = sample_quiz();
    quiz.questions.clear();
    assert_eq!(TakeSession::start(quiz, EmptyPolicy::default()).unwrap_err(), SessionError::EmptyQuiz);
  }
}
