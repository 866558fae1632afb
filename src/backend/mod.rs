//! External collaborators: record store, blob store and identity provider.
//!
//! Two implementations ship: `memory` (used when no hosted backend is configured, and in
//! tests) and `supabase` (PostgREST tables, storage bucket and auth over HTTP).

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::User;
use crate::error::AppResult;
use crate::records::{AnswerRecord, PersonalityTypeRecord, QuestionRecord, QuizRecord};

pub mod memory;
pub mod supabase;

/// Which quizzes to select.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizFilter {
    Id(String),
    Slug(String),
    Owner(String),
    Published,
}

/// Row-level access to the four record kinds. Upserts insert or replace by primary key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select_quizzes(&self, filter: &QuizFilter) -> AppResult<Vec<QuizRecord>>;
    async fn upsert_quiz(&self, record: &QuizRecord) -> AppResult<()>;
    async fn delete_quiz(&self, id: &str) -> AppResult<()>;

    async fn select_personality_types(&self, quiz_id: &str) -> AppResult<Vec<PersonalityTypeRecord>>;
    async fn upsert_personality_types(&self, records: &[PersonalityTypeRecord]) -> AppResult<()>;
    async fn delete_personality_types(&self, ids: &[String]) -> AppResult<()>;

    async fn select_questions(&self, quiz_id: &str) -> AppResult<Vec<QuestionRecord>>;
    async fn upsert_questions(&self, records: &[QuestionRecord]) -> AppResult<()>;
    async fn delete_questions(&self, ids: &[String]) -> AppResult<()>;

    async fn select_answers(&self, question_ids: &[String]) -> AppResult<Vec<AnswerRecord>>;
    async fn upsert_answers(&self, records: &[AnswerRecord]) -> AppResult<()>;
    async fn delete_answers(&self, ids: &[String]) -> AppResult<()>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return its public URL.
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;

    /// Read back an object as `(content_type, bytes)`. Stores whose URLs are served
    /// elsewhere return `None`.
    async fn fetch(&self, _path: &str) -> AppResult<Option<(String, Vec<u8>)>> {
        Ok(None)
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to the signed-in user.
    async fn current_user(&self, access_token: &str) -> AppResult<User>;
}

/// Handles to all collaborators, passed explicitly to the flows in `logic`.
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub identity: Arc<dyn IdentityProvider>,
    /// "memory" or "supabase", for logs.
    pub label: &'static str,
}
