//! In-memory backend: tables held in process, blobs kept as bytes, and a fixed
//! token → user table for identity. Rows keep insertion order like a heap table.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{BlobStore, IdentityProvider, QuizFilter, RecordStore};
use crate::domain::User;
use crate::error::{AppError, AppResult};
use crate::records::{
    AnswerRecord, Keyed, PersonalityTypeRecord, QuestionRecord, QuizRecord, RecordSet, ANSWERS, PERSONALITY_TYPES,
    QUESTIONS, QUIZZES,
};

#[derive(Default)]
struct Tables {
    quizzes: Vec<QuizRecord>,
    personality_types: Vec<PersonalityTypeRecord>,
    questions: Vec<QuestionRecord>,
    answers: Vec<AnswerRecord>,
}

fn upsert_rows<T: Keyed + Clone>(table: &mut Vec<T>, rows: &[T]) {
    for row in rows {
        match table.iter_mut().find(|r| r.key() == row.key()) {
            Some(slot) => *slot = row.clone(),
            None => table.push(row.clone()),
        }
    }
}

fn delete_rows<T: Keyed>(table: &mut Vec<T>, ids: &[String]) {
    table.retain(|r| !ids.iter().any(|id| id == r.key()));
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    #[cfg(test)]
    fail_table: std::sync::Mutex<Option<&'static str>>,
}

impl MemoryStore {
    /// Store pre-populated with complete quizzes (used for seeding at startup).
    pub fn with_records(sets: Vec<RecordSet>) -> Self {
        let mut t = Tables::default();
        for s in sets {
            upsert_rows(&mut t.quizzes, std::slice::from_ref(&s.quiz));
            upsert_rows(&mut t.personality_types, &s.personality_types);
            upsert_rows(&mut t.questions, &s.questions);
            upsert_rows(&mut t.answers, &s.answers);
        }
        Self { tables: RwLock::new(t), ..Default::default() }
    }

    /// Make every following write to `table` fail with a backend error.
    #[cfg(test)]
    pub fn fail_writes_to(&self, table: &'static str) {
        if let Ok(mut g) = self.fail_table.lock() {
            *g = Some(table);
        }
    }

    #[cfg(test)]
    fn check_write(&self, table: &'static str) -> AppResult<()> {
        match self.fail_table.lock().ok().and_then(|g| *g) {
            Some(t) if t == table => Err(AppError::Backend(format!("simulated write failure on {table}"))),
            _ => Ok(()),
        }
    }

    #[cfg(not(test))]
    fn check_write(&self, _table: &'static str) -> AppResult<()> {
        Ok(())
    }

    /// Row counts per table, for tests and startup logs.
    pub async fn counts(&self) -> (usize, usize, usize, usize) {
        let t = self.tables.read().await;
        (t.quizzes.len(), t.personality_types.len(), t.questions.len(), t.answers.len())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select_quizzes(&self, filter: &QuizFilter) -> AppResult<Vec<QuizRecord>> {
        let t = self.tables.read().await;
        Ok(t.quizzes
            .iter()
            .filter(|q| match filter {
                QuizFilter::Id(id) => &q.id == id,
                QuizFilter::Slug(slug) => &q.slug == slug,
                QuizFilter::Owner(owner) => &q.owner_id == owner,
                QuizFilter::Published => q.is_published,
            })
            .cloned()
            .collect())
    }

    async fn upsert_quiz(&self, record: &QuizRecord) -> AppResult<()> {
        self.check_write(QUIZZES)?;
        upsert_rows(&mut self.tables.write().await.quizzes, std::slice::from_ref(record));
        Ok(())
    }

    async fn delete_quiz(&self, id: &str) -> AppResult<()> {
        self.check_write(QUIZZES)?;
        delete_rows(&mut self.tables.write().await.quizzes, &[id.to_string()]);
        Ok(())
    }

    async fn select_personality_types(&self, quiz_id: &str) -> AppResult<Vec<PersonalityTypeRecord>> {
        let t = self.tables.read().await;
        Ok(t.personality_types.iter().filter(|r| r.quiz_id == quiz_id).cloned().collect())
    }

    async fn upsert_personality_types(&self, records: &[PersonalityTypeRecord]) -> AppResult<()> {
        self.check_write(PERSONALITY_TYPES)?;
        upsert_rows(&mut self.tables.write().await.personality_types, records);
        Ok(())
    }

    async fn delete_personality_types(&self, ids: &[String]) -> AppResult<()> {
        self.check_write(PERSONALITY_TYPES)?;
        delete_rows(&mut self.tables.write().await.personality_types, ids);
        Ok(())
    }

    async fn select_questions(&self, quiz_id: &str) -> AppResult<Vec<QuestionRecord>> {
        let t = self.tables.read().await;
        Ok(t.questions.iter().filter(|r| r.quiz_id == quiz_id).cloned().collect())
    }

    async fn upsert_questions(&self, records: &[QuestionRecord]) -> AppResult<()> {
        self.check_write(QUESTIONS)?;
        upsert_rows(&mut self.tables.write().await.questions, records);
        Ok(())
    }

    async fn delete_questions(&self, ids: &[String]) -> AppResult<()> {
        self.check_write(QUESTIONS)?;
        delete_rows(&mut self.tables.write().await.questions, ids);
        Ok(())
    }

    async fn select_answers(&self, question_ids: &[String]) -> AppResult<Vec<AnswerRecord>> {
        let t = self.tables.read().await;
        Ok(t.answers
            .iter()
            .filter(|r| question_ids.iter().any(|q| q == &r.question_id))
            .cloned()
            .collect())
    }

    async fn upsert_answers(&self, records: &[AnswerRecord]) -> AppResult<()> {
        self.check_write(ANSWERS)?;
        upsert_rows(&mut self.tables.write().await.answers, records);
        Ok(())
    }

    async fn delete_answers(&self, ids: &[String]) -> AppResult<()> {
        self.check_write(ANSWERS)?;
        delete_rows(&mut self.tables.write().await.answers, ids);
        Ok(())
    }
}

/// Keeps uploaded bytes in memory and hands out URLs under `public_base_url`.
pub struct MemoryBlobs {
    public_base_url: String,
    objects: RwLock<HashMap<String, (String, Vec<u8>)>>,
}

impl MemoryBlobs {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self { public_base_url: public_base_url.into(), objects: RwLock::new(HashMap::new()) }
    }

    pub async fn get(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.objects.read().await.get(path).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    #[instrument(level = "debug", skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        self.objects
            .write()
            .await
            .insert(path.to_string(), (content_type.to_string(), bytes));
        let url = format!("{}/{}", self.public_base_url.trim_end_matches('/'), path);
        debug!(target: "backend", %url, "Stored blob in memory");
        Ok(url)
    }

    async fn fetch(&self, path: &str) -> AppResult<Option<(String, Vec<u8>)>> {
        Ok(self.get(path).await)
    }
}

/// Static token table, filled from configuration.
pub struct StaticIdentity {
    users: HashMap<String, User>,
}

impl StaticIdentity {
    pub fn new(users: impl IntoIterator<Item = (String, User)>) -> Self {
        Self { users: users.into_iter().collect() }
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn current_user(&self, access_token: &str) -> AppResult<User> {
        self.users.get(access_token).cloned().ok_or(AppError::Unauthorized)
    }
}
