//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - loading quizzes through the forward transform
//!   - saving drafts (diff-based upsert keyed by stable ids)
//!   - deleting with explicit cascade
//!   - scoring submitted responses and counting takes
//!   - image uploads and import reconciliation

use std::collections::{HashMap, HashSet};
use std::future::Future;

use chrono::Utc;
use tracing::{error, info, instrument, warn};

use crate::backend::{Backend, QuizFilter, RecordStore};
use crate::builder::QuizDraft;
use crate::domain::{Quiz, QuizResponse, User};
use crate::error::{AppError, AppResult};
use crate::ids::IdGen;
use crate::records::{AnswerRecord, Keyed, PersonalityTypeRecord, QuestionRecord, QuizRecord};
use crate::scoring::{score_quiz, ScoreSheet};
use crate::state::AppState;
use crate::transform::{assemble_quiz, check_unique_ids, disassemble_quiz};
use crate::util::{blob_path, trunc_for_log, ImageKind};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

async fn find_quiz(records: &dyn RecordStore, filter: QuizFilter) -> AppResult<QuizRecord> {
  records
    .select_quizzes(&filter)
    .await?
    .into_iter()
    .next()
    .ok_or_else(|| AppError::NotFound(format!("quiz {filter:?}")))
}

/// Load children for one quiz record and assemble the tree.
async fn fetch_tree(records: &dyn RecordStore, record: QuizRecord) -> AppResult<Quiz> {
  let types = records.select_personality_types(&record.id).await?;
  let questions = records.select_questions(&record.id).await?;
  let question_ids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
  let answers = records.select_answers(&question_ids).await?;
  Ok(assemble_quiz(record, &questions, &answers, &types))
}

#[instrument(level = "info", skip(backend))]
pub async fn load_quiz(backend: &Backend, filter: QuizFilter) -> AppResult<Quiz> {
  let record = find_quiz(backend.records.as_ref(), filter).await?;
  fetch_tree(backend.records.as_ref(), record).await
}

/// Only published quizzes can be taken.
pub async fn load_published(backend: &Backend, filter: QuizFilter) -> AppResult<Quiz> {
  let quiz = load_quiz(backend, filter.clone()).await?;
  if !quiz.is_published {
    return Err(AppError::NotFound(format!("quiz {filter:?}")));
  }
  Ok(quiz)
}

/// Published quizzes are visible to everyone; drafts only to their owner.
pub async fn load_for_viewer(backend: &Backend, id: &str, viewer: Option<&User>) -> AppResult<Quiz> {
  let quiz = load_quiz(backend, QuizFilter::Id(id.to_string())).await?;
  let is_owner = viewer.is_some_and(|u| u.id == quiz.owner_id);
  if quiz.is_published || is_owner {
    Ok(quiz)
  } else {
    Err(AppError::NotFound(format!("quiz {id}")))
  }
}

pub async fn list_published(backend: &Backend) -> AppResult<Vec<QuizRecord>> {
  backend.records.select_quizzes(&QuizFilter::Published).await
}

pub async fn list_owned(backend: &Backend, user: &User) -> AppResult<Vec<QuizRecord>> {
  backend.records.select_quizzes(&QuizFilter::Owner(user.id.clone())).await
}

/// Await one save step; on failure log which step broke. Steps already applied stay applied.
async fn step<T>(quiz_id: &str, name: &'static str, fut: impl Future<Output = AppResult<T>>) -> AppResult<T> {
  fut.await.map_err(|e| {
    error!(target: "backend", %quiz_id, step = name, error = %e, "Save step failed; earlier steps remain applied");
    AppError::Backend(format!("saving quiz failed at step '{name}'"))
  })
}

fn stale_ids<T: Keyed>(old: &[T], new: &[T]) -> Vec<String> {
  let keep: HashSet<&str> = new.iter().map(|r| r.key()).collect();
  old.iter().filter(|r| !keep.contains(r.key())).map(|r| r.key().to_string()).collect()
}

/// Keep a child id only if this quiz already stores a row under it; every other entity gets
/// a fresh id, so a save never rewrites rows owned by another quiz. Answers follow their
/// type to its new id. Returns how many non-empty ids were replaced.
fn claim_ids(
  quiz: &mut Quiz,
  old_types: &[PersonalityTypeRecord],
  old_questions: &[QuestionRecord],
  old_answers: &[AnswerRecord],
  ids: &dyn IdGen,
) -> usize {
  let own_types: HashSet<&str> = old_types.iter().map(|r| r.key()).collect();
  let own_questions: HashSet<&str> = old_questions.iter().map(|r| r.key()).collect();
  let own_answers: HashSet<&str> = old_answers.iter().map(|r| r.key()).collect();

  let mut reassigned = 0;
  let mut retyped: HashMap<String, String> = HashMap::new();
  for t in quiz.personality_types.iter_mut() {
    if own_types.contains(t.id.as_str()) {
      continue;
    }
    let fresh = ids.fresh_id();
    let old = std::mem::replace(&mut t.id, fresh.clone());
    if !old.is_empty() {
      retyped.insert(old, fresh);
      reassigned += 1;
    }
  }

  for q in quiz.questions.iter_mut() {
    if !own_questions.contains(q.id.as_str()) {
      if !q.id.is_empty() {
        reassigned += 1;
      }
      q.id = ids.fresh_id();
    }
    for a in q.answers.iter_mut() {
      if !own_answers.contains(a.id.as_str()) {
        if !a.id.is_empty() {
          reassigned += 1;
        }
        a.id = ids.fresh_id();
      }
      if let Some(new_id) = retyped.get(&a.personality_type) {
        a.personality_type = new_id.clone();
      }
    }
  }
  reassigned
}

/// Save a draft for `user`: create when `quiz_id` is empty, otherwise update in place.
///
/// Order: quiz → personality types → questions → answers (all upserts), then deletion of
/// stale answers → questions → types. A stored answer never points at a deleted type.
#[instrument(level = "info", skip(state, user, draft), fields(user = %user.id, quiz_id = ?draft.quiz_id, questions = draft.questions.len()))]
pub async fn save_quiz(state: &AppState, user: &User, draft: QuizDraft) -> AppResult<Quiz> {
  draft.validate()?;
  let records = state.backend.records.as_ref();
  let slug = draft.effective_slug();

  let existing = match draft.quiz_id.as_deref().filter(|id| !id.is_empty()) {
    Some(id) => {
      let rec = find_quiz(records, QuizFilter::Id(id.to_string())).await?;
      if rec.owner_id != user.id {
        return Err(AppError::Forbidden(format!("quiz {id} belongs to another user")));
      }
      Some(rec)
    }
    None => None,
  };

  let clash = records.select_quizzes(&QuizFilter::Slug(slug.clone())).await?;
  if clash.iter().any(|q| Some(&q.id) != existing.as_ref().map(|e| &e.id)) {
    return Err(AppError::Conflict(format!("slug '{slug}' is already taken")));
  }

  let now = Utc::now();
  let mut quiz = draft.into_quiz(&user.id, now)?;
  if let Some(rec) = &existing {
    quiz.created_at = rec.created_at;
    quiz.total_takes = rec.total_takes;
  }

  let (old_types, old_questions, old_answers) = match &existing {
    Some(rec) => {
      let types = records.select_personality_types(&rec.id).await?;
      let questions = records.select_questions(&rec.id).await?;
      let qids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
      let answers = records.select_answers(&qids).await?;
      (types, questions, answers)
    }
    None => Default::default(),
  };

  check_unique_ids(&quiz)?;
  let reassigned = claim_ids(&mut quiz, &old_types, &old_questions, &old_answers, state.ids.as_ref());
  if reassigned > 0 && existing.is_some() {
    warn!(target: "quiz", quiz_id = %quiz.id, reassigned, "Draft carried ids this quiz does not own; gave them fresh ids");
  }
  let set = disassemble_quiz(&quiz, state.ids.as_ref())?;
  let quiz_id = set.quiz.id.clone();

  step(&quiz_id, "quiz", records.upsert_quiz(&set.quiz)).await?;
  step(&quiz_id, "personality_types", records.upsert_personality_types(&set.personality_types)).await?;
  step(&quiz_id, "questions", records.upsert_questions(&set.questions)).await?;
  step(&quiz_id, "answers", records.upsert_answers(&set.answers)).await?;

  let stale_answers = stale_ids(&old_answers, &set.answers);
  let stale_questions = stale_ids(&old_questions, &set.questions);
  let stale_types = stale_ids(&old_types, &set.personality_types);
  if !stale_answers.is_empty() {
    step(&quiz_id, "delete_answers", records.delete_answers(&stale_answers)).await?;
  }
  if !stale_questions.is_empty() {
    step(&quiz_id, "delete_questions", records.delete_questions(&stale_questions)).await?;
  }
  if !stale_types.is_empty() {
    step(&quiz_id, "delete_personality_types", records.delete_personality_types(&stale_types)).await?;
  }

  info!(
    target: "quiz",
    %quiz_id,
    %slug,
    created = existing.is_none(),
    removed_answers = stale_answers.len(),
    removed_questions = stale_questions.len(),
    removed_types = stale_types.len(),
    "Quiz saved"
  );
  Ok(assemble_quiz(set.quiz, &set.questions, &set.answers, &set.personality_types))
}

/// Owner-only delete with explicit cascade (answers → questions → types → quiz).
#[instrument(level = "info", skip(backend, user), fields(user = %user.id))]
pub async fn delete_quiz(backend: &Backend, user: &User, id: &str) -> AppResult<()> {
  let records = backend.records.as_ref();
  let rec = find_quiz(records, QuizFilter::Id(id.to_string())).await?;
  if rec.owner_id != user.id {
    return Err(AppError::Forbidden(format!("quiz {id} belongs to another user")));
  }
  let questions = records.select_questions(id).await?;
  let qids: Vec<String> = questions.iter().map(|q| q.id.clone()).collect();
  let answer_ids: Vec<String> = records.select_answers(&qids).await?.into_iter().map(|a| a.id).collect();
  let type_ids: Vec<String> = records.select_personality_types(id).await?.into_iter().map(|t| t.id).collect();

  step(id, "delete_answers", records.delete_answers(&answer_ids)).await?;
  step(id, "delete_questions", records.delete_questions(&qids)).await?;
  step(id, "delete_personality_types", records.delete_personality_types(&type_ids)).await?;
  step(id, "delete_quiz", records.delete_quiz(id)).await?;
  info!(target: "quiz", quiz_id = %id, "Quiz deleted");
  Ok(())
}

/// Bump the take count. Read-modify-write; concurrent takes can lose an increment.
pub async fn record_take(backend: &Backend, quiz_id: &str) -> AppResult<u64> {
  let mut rec = find_quiz(backend.records.as_ref(), QuizFilter::Id(quiz_id.to_string())).await?;
  rec.total_takes += 1;
  backend.records.upsert_quiz(&rec).await?;
  Ok(rec.total_takes)
}

/// Score a completed session against a published quiz and count the take. Submissions
/// where no response resolved are scored but not counted. A failed take-count update is
/// logged; the result is still returned.
#[instrument(level = "info", skip(state, responses), fields(responses = responses.len()))]
pub async fn score_responses(state: &AppState, quiz_id: &str, responses: &[QuizResponse]) -> AppResult<ScoreSheet> {
  let quiz = load_published(&state.backend, QuizFilter::Id(quiz_id.to_string())).await?;
  let sheet = score_quiz(&quiz, responses, state.empty_policy())?;
  if sheet.counted > 0 {
    finish_take(&state.backend, &quiz.id).await;
  }
  info!(target: "scoring", %quiz_id, winner = %sheet.winner.id, skipped = sheet.skipped.len(), "Quiz scored");
  Ok(sheet)
}

pub async fn finish_take(backend: &Backend, quiz_id: &str) {
  if let Err(e) = record_take(backend, quiz_id).await {
    warn!(target: "quiz", %quiz_id, error = %e, "Failed to record take");
  }
}

/// Store an image under the uploader's namespace and return its public URL.
#[instrument(level = "info", skip(state, user, bytes), fields(user = %user.id, size = bytes.len()))]
pub async fn upload_image(
  state: &AppState,
  user: &User,
  kind: ImageKind,
  filename: &str,
  content_type: &str,
  bytes: Vec<u8>,
) -> AppResult<String> {
  if !content_type.starts_with("image/") {
    return Err(AppError::BadRequest(format!("unsupported content type '{content_type}'")));
  }
  if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES {
    return Err(AppError::BadRequest(format!("image must be between 1 byte and {MAX_IMAGE_BYTES} bytes")));
  }
  let path = blob_path(&user.id, kind, Utc::now().timestamp_millis(), filename);
  let url = state.backend.blobs.upload(&path, bytes, content_type).await.map_err(|e| {
    error!(target: "backend", %path, error = %e, "Image upload failed");
    e
  })?;
  Ok(url)
}

/// Reconcile an import document into a fresh draft (nothing is stored).
#[instrument(level = "info", skip(state, raw), fields(doc = %trunc_for_log(raw, 80)))]
pub fn import_draft(state: &AppState, raw: &str) -> AppResult<QuizDraft> {
  let mut draft = QuizDraft::new();
  draft.apply_import(raw, state.ids.as_ref())?;
  Ok(draft)
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::backend::memory::{MemoryBlobs, MemoryStore, StaticIdentity};
  use crate::config::AppConfig;
  use crate::error::ValidationError;
  use crate::ids::SequentialIds;
  use crate::import::tests::DOC;
  use crate::records::ANSWERS;
  use crate::transform::check_references;

  pub(crate) fn alice() -> User {
    User { id: "alice".into(), email: Some("alice@example.com".into()) }
  }

  pub(crate) fn test_state_with(store: Arc<MemoryStore>) -> AppState {
    let backend = Backend {
      records: store,
      blobs: Arc::new(MemoryBlobs::new("http://blobs.test")),
      identity: Arc::new(StaticIdentity::new([("alice-token".to_string(), alice())])),
      label: "memory",
    };
    AppState::with_backend(backend, AppConfig::default(), Arc::new(SequentialIds::default()))
  }

  pub(crate) fn test_state() -> AppState {
    test_state_with(Arc::new(MemoryStore::default()))
  }

  fn published_draft(state: &AppState) -> QuizDraft {
    let mut d = import_draft(state, DOC).expect("draft");
    d.is_published = true;
    d
  }

  #[tokio::test]
  async fn save_then_load_round_trips() {
    let state = test_state();
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    assert!(!saved.id.is_empty());
    assert_eq!(saved.owner_id, "alice");

    let loaded = load_quiz(&state.backend, QuizFilter::Slug("which-season-are-you".into())).await.expect("load");
    assert_eq!(loaded, saved);
  }

  #[tokio::test]
  async fn update_keeps_ids_and_removes_stale_children() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state_with(store.clone());
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    let summer_id = saved.personality_types[0].id.clone();

    let mut draft = QuizDraft::from_quiz(&saved);
    draft.questions.remove(0);
    draft.questions[0].answers.pop();
    let updated = save_quiz(&state, &alice(), draft).await.expect("update");

    assert_eq!(updated.id, saved.id);
    assert_eq!(updated.created_at, saved.created_at);
    assert_eq!(updated.personality_types[0].id, summer_id);
    assert_eq!(updated.questions.len(), 1);
    assert_eq!(updated.questions[0].order_index, 0);
    assert_eq!(store.counts().await, (1, 2, 1, 1));
  }

  #[tokio::test]
  async fn removing_a_type_deletes_it_after_answers_move() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state_with(store.clone());
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    let summer = saved.personality_types[0].id.clone();
    let winter = saved.personality_types[1].id.clone();

    let mut draft = QuizDraft::from_quiz(&saved);
    for q in draft.questions.iter_mut() {
      for a in q.answers.iter_mut() {
        a.personality_type = summer.clone();
      }
    }
    draft.remove_personality_type(&winter);
    let updated = save_quiz(&state, &alice(), draft).await.expect("update");
    assert_eq!(updated.personality_types.len(), 1);
    assert_eq!(store.counts().await.1, 1);
  }

  #[tokio::test]
  async fn invalid_references_block_the_save() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state_with(store.clone());
    let mut draft = published_draft(&state);
    draft.questions[0].answers[0].personality_type = "not-a-type".into();
    let err = save_quiz(&state, &alice(), draft).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(ValidationError::UnresolvedPersonalityType { .. })));
    assert_eq!(store.counts().await, (0, 0, 0, 0));
  }

  #[tokio::test]
  async fn other_users_cannot_overwrite_or_reuse_slug() {
    let state = test_state();
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    let bob = User { id: "bob".into(), email: None };

    let err = save_quiz(&state, &bob, QuizDraft::from_quiz(&saved)).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = save_quiz(&state, &bob, published_draft(&state)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = delete_quiz(&state.backend, &bob, &saved.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
  }

  #[tokio::test]
  async fn copying_another_quiz_never_takes_over_its_rows() {
    let state = test_state();
    let original = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    let bob = User { id: "bob".into(), email: None };

    let mut copy = QuizDraft::from_quiz(&original);
    copy.quiz_id = None;
    copy.slug = "seasons-copy".into();
    let theirs = save_quiz(&state, &bob, copy).await.expect("copy");

    let reloaded = load_quiz(&state.backend, QuizFilter::Id(original.id.clone())).await.expect("load");
    assert_eq!(reloaded, original);
    check_references(&reloaded).expect("original still consistent");

    let original_ids: HashSet<&str> = original
      .personality_types
      .iter()
      .map(|t| t.id.as_str())
      .chain(original.questions.iter().map(|q| q.id.as_str()))
      .chain(original.questions.iter().flat_map(|q| q.answers.iter().map(|a| a.id.as_str())))
      .collect();
    assert!(theirs.personality_types.iter().all(|t| !original_ids.contains(t.id.as_str())));
    assert!(theirs.questions.iter().all(|q| !original_ids.contains(q.id.as_str())));
    check_references(&theirs).expect("copy points at its own types");
    assert_eq!(theirs.questions[0].answers[1].personality_type, theirs.personality_types[1].id);

    let q = &theirs.questions[0];
    let responses = [QuizResponse { question_id: q.id.clone(), answer_id: q.answers[1].id.clone() }];
    assert_eq!(score_responses(&state, &theirs.id, &responses).await.expect("score").winner.name, "Winter");
  }

  #[tokio::test]
  async fn update_cannot_adopt_ids_from_another_quiz() {
    let state = test_state();
    let first = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    let mut other = published_draft(&state);
    other.slug = "second".into();
    let second = save_quiz(&state, &alice(), other).await.expect("save");

    let mut draft = QuizDraft::from_quiz(&second);
    draft.questions.push(first.questions[0].clone());
    draft.questions[2].answers.iter_mut().for_each(|a| a.personality_type = second.personality_types[0].id.clone());
    let updated = save_quiz(&state, &alice(), draft).await.expect("update");
    assert_ne!(updated.questions[2].id, first.questions[0].id);

    let first_again = load_quiz(&state.backend, QuizFilter::Id(first.id.clone())).await.expect("load");
    assert_eq!(first_again, first);
  }

  #[tokio::test]
  async fn submissions_without_counted_responses_are_not_takes() {
    let state = test_state();
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    score_responses(&state, &saved.id, &[]).await.expect("empty still scores");
    let stale = [QuizResponse { question_id: "gone".into(), answer_id: "gone".into() }];
    let sheet = score_responses(&state, &saved.id, &stale).await.expect("stale still scores");
    assert_eq!(sheet.counted, 0);
    let reloaded = load_quiz(&state.backend, QuizFilter::Id(saved.id.clone())).await.expect("load");
    assert_eq!(reloaded.total_takes, 0);
  }

  #[tokio::test]
  async fn backend_failure_is_one_error_and_not_rolled_back() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state_with(store.clone());
    store.fail_writes_to(ANSWERS);
    let err = save_quiz(&state, &alice(), published_draft(&state)).await.unwrap_err();
    match err {
      AppError::Backend(msg) => assert!(msg.contains("answers")),
      other => panic!("unexpected {other:?}"),
    }
    // Quiz, types and questions were written before the failing step.
    assert_eq!(store.counts().await, (1, 2, 2, 0));
  }

  #[tokio::test]
  async fn delete_cascades() {
    let store = Arc::new(MemoryStore::default());
    let state = test_state_with(store.clone());
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    delete_quiz(&state.backend, &alice(), &saved.id).await.expect("delete");
    assert_eq!(store.counts().await, (0, 0, 0, 0));
    assert!(matches!(load_quiz(&state.backend, QuizFilter::Id(saved.id)).await, Err(AppError::NotFound(_))));
  }

  #[tokio::test]
  async fn scoring_counts_takes_and_requires_publication() {
    let state = test_state();
    let saved = save_quiz(&state, &alice(), published_draft(&state)).await.expect("save");
    let q = &saved.questions[0];
    let responses = [QuizResponse { question_id: q.id.clone(), answer_id: q.answers[1].id.clone() }];
    let sheet = score_responses(&state, &saved.id, &responses).await.expect("score");
    assert_eq!(sheet.winner.name, "Winter");
    let reloaded = load_quiz(&state.backend, QuizFilter::Id(saved.id.clone())).await.expect("load");
    assert_eq!(reloaded.total_takes, 1);

    let mut draft = QuizDraft::from_quiz(&reloaded);
    draft.is_published = false;
    let unpublished = save_quiz(&state, &alice(), draft).await.expect("save");
    assert_eq!(unpublished.total_takes, 1);
    assert!(matches!(score_responses(&state, &saved.id, &responses).await, Err(AppError::NotFound(_))));
    assert!(load_for_viewer(&state.backend, &saved.id, Some(&alice())).await.is_ok());
    assert!(load_for_viewer(&state.backend, &saved.id, None).await.is_err());
  }

  #[tokio::test]
  async fn uploads_are_namespaced_and_type_checked() {
    let state = test_state();
    let url = upload_image(&state, &alice(), ImageKind::Question, "q.png", "image/png", vec![1, 2])
      .await
      .expect("upload");
    assert!(url.starts_with("http://blobs.test/alice/questions/"));
    assert!(url.ends_with("-q.png"));
    let err = upload_image(&state, &alice(), ImageKind::Cover, "x.txt", "text/plain", vec![1]).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
  }
}
