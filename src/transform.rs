//! Conversion between stored records and the in-memory quiz tree.
//!
//! `assemble_quiz` is the load direction: it accepts flat record lists that may span many
//! quizzes and keeps only the rows belonging to the target quiz. `disassemble_quiz` is the
//! save direction and refuses to emit records while any answer points at a personality
//! type the quiz does not define.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::domain::{Answer, PersonalityType, Question, Quiz};
use crate::error::ValidationError;
use crate::ids::IdGen;
use crate::records::{AnswerRecord, PersonalityTypeRecord, QuestionRecord, QuizRecord, RecordSet};

#[instrument(level = "debug", skip_all, fields(quiz_id = %quiz.id))]
pub fn assemble_quiz(
    quiz: QuizRecord,
    questions: &[QuestionRecord],
    answers: &[AnswerRecord],
    types: &[PersonalityTypeRecord],
) -> Quiz {
    let mut own_types: Vec<&PersonalityTypeRecord> = types.iter().filter(|t| t.quiz_id == quiz.id).collect();
    own_types.sort_by_key(|t| t.order_index);

    let mut own_questions: Vec<&QuestionRecord> = questions.iter().filter(|q| q.quiz_id == quiz.id).collect();
    own_questions.sort_by_key(|q| q.order_index);

    let questions: Vec<Question> = own_questions
        .into_iter()
        .map(|q| {
            let mut rows: Vec<&AnswerRecord> = answers.iter().filter(|a| a.question_id == q.id).collect();
            rows.sort_by_key(|a| a.order_index);
            Question {
                id: q.id.clone(),
                text: q.text.clone(),
                image_url: q.image_url.clone(),
                order_index: q.order_index,
                answers: rows
                    .into_iter()
                    .map(|a| Answer {
                        id: a.id.clone(),
                        text: a.text.clone(),
                        personality_type: a.personality_type_id.clone(),
                        weight: a.weight,
                        order_index: a.order_index,
                    })
                    .collect(),
            }
        })
        .collect();

    let personality_types = own_types
        .into_iter()
        .map(|t| PersonalityType {
            id: t.id.clone(),
            name: t.name.clone(),
            description: t.description.clone(),
            color: t.color.clone(),
            icon: t.icon.clone(),
            result_image_url: t.result_image_url.clone(),
        })
        .collect();

    debug!(target: "quiz", questions = questions.len(), "Assembled quiz tree");

    Quiz {
        id: quiz.id,
        owner_id: quiz.owner_id,
        title: quiz.title,
        description: quiz.description,
        cover_image_url: quiz.cover_image_url,
        is_published: quiz.is_published,
        slug: quiz.slug,
        created_at: quiz.created_at,
        updated_at: quiz.updated_at,
        total_takes: quiz.total_takes,
        questions,
        personality_types,
    }
}

/// Every answer must reference a personality type declared on the same quiz.
pub fn check_references(quiz: &Quiz) -> Result<(), ValidationError> {
    let known: HashSet<&str> = quiz
        .personality_types
        .iter()
        .filter(|t| !t.id.is_empty())
        .map(|t| t.id.as_str())
        .collect();
    for q in &quiz.questions {
        for a in &q.answers {
            if !known.contains(a.personality_type.as_str()) {
                return Err(ValidationError::UnresolvedPersonalityType {
                    question_id: q.id.clone(),
                    answer_id: a.id.clone(),
                    personality_type: a.personality_type.clone(),
                });
            }
        }
    }
    Ok(())
}

fn check_unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids.filter(|id| !id.is_empty()) {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId { kind, id: id.to_string() });
        }
    }
    Ok(())
}

/// Non-empty ids must not repeat within their kind.
pub fn check_unique_ids(quiz: &Quiz) -> Result<(), ValidationError> {
    check_unique("personality type", quiz.personality_types.iter().map(|t| t.id.as_str()))?;
    check_unique("question", quiz.questions.iter().map(|q| q.id.as_str()))?;
    check_unique("answer", quiz.questions.iter().flat_map(|q| q.answers.iter().map(|a| a.id.as_str())))
}

fn keep_or_fresh(id: &str, ids: &dyn IdGen) -> String {
    if id.is_empty() { ids.fresh_id() } else { id.to_string() }
}

/// Produce the records that persist `quiz`. Existing ids are kept; entities without one
/// get a fresh id. Order indices come from array position, not from the tree's fields.
#[instrument(level = "debug", skip_all, fields(quiz_id = %quiz.id))]
pub fn disassemble_quiz(quiz: &Quiz, ids: &dyn IdGen) -> Result<RecordSet, ValidationError> {
    check_references(quiz)?;
    check_unique_ids(quiz)?;

    let quiz_id = keep_or_fresh(&quiz.id, ids);

    let personality_types = quiz
        .personality_types
        .iter()
        .enumerate()
        .map(|(i, t)| PersonalityTypeRecord {
            id: keep_or_fresh(&t.id, ids),
            quiz_id: quiz_id.clone(),
            name: t.name.clone(),
            description: t.description.clone(),
            color: t.color.clone(),
            icon: t.icon.clone(),
            result_image_url: t.result_image_url.clone(),
            order_index: i as u32,
        })
        .collect();

    let mut questions = Vec::with_capacity(quiz.questions.len());
    let mut answers = Vec::new();
    for (qi, q) in quiz.questions.iter().enumerate() {
        let question_id = keep_or_fresh(&q.id, ids);
        for (ai, a) in q.answers.iter().enumerate() {
            answers.push(AnswerRecord {
                id: keep_or_fresh(&a.id, ids),
                question_id: question_id.clone(),
                text: a.text.clone(),
                weight: a.weight,
                order_index: ai as u32,
                personality_type_id: a.personality_type.clone(),
            });
        }
        questions.push(QuestionRecord {
            id: question_id,
            quiz_id: quiz_id.clone(),
            text: q.text.clone(),
            image_url: q.image_url.clone(),
            order_index: qi as u32,
        });
    }

    let record = QuizRecord {
        id: quiz_id,
        owner_id: quiz.owner_id.clone(),
        title: quiz.title.clone(),
        description: quiz.description.clone(),
        cover_image_url: quiz.cover_image_url.clone(),
        is_published: quiz.is_published,
        slug: quiz.slug.clone(),
        created_at: quiz.created_at,
        updated_at: quiz.updated_at,
        total_takes: quiz.total_takes,
    };

    Ok(RecordSet { quiz: record, personality_types, questions, answers })
}
