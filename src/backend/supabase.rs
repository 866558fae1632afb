//! Hosted backend over HTTP: PostgREST tables (`/rest/v1`), object storage
//! (`/storage/v1`) and auth (`/auth/v1`).
//!
//! NOTE: the service key is sent as both `apikey` and bearer token; it is never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

use super::{BlobStore, IdentityProvider, QuizFilter, RecordStore};
use crate::domain::User;
use crate::error::{AppError, AppResult};
use crate::records::{
    AnswerRecord, PersonalityTypeRecord, QuestionRecord, QuizRecord, ANSWERS, PERSONALITY_TYPES, QUESTIONS, QUIZZES,
};
use crate::util::trunc_for_log;

const UA: &str = "persona-quiz-backend/0.1";

#[derive(Clone)]
pub struct Supabase {
    pub client: reqwest::Client,
    pub base_url: String,
    pub api_key: String,
    pub bucket: String,
}

#[derive(Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// `in.("a","b")` filter value.
fn in_list(ids: &[String]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{}\"", id.replace('"', ""))).collect();
    format!("in.({})", quoted.join(","))
}

fn quiz_filter_param(filter: &QuizFilter) -> (&'static str, String) {
    match filter {
        QuizFilter::Id(id) => ("id", format!("eq.{id}")),
        QuizFilter::Slug(slug) => ("slug", format!("eq.{slug}")),
        QuizFilter::Owner(owner) => ("owner_id", format!("eq.{owner}")),
        QuizFilter::Published => ("is_published", "eq.true".to_string()),
    }
}

impl Supabase {
    /// Build the client if SUPABASE_URL and SUPABASE_KEY are set; otherwise None.
    pub fn from_env(bucket: &str) -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let api_key = std::env::var("SUPABASE_KEY").ok()?;
        let bucket = std::env::var("SUPABASE_BUCKET").unwrap_or_else(|_| bucket.to_string());
        Self::from_parts(&base_url, api_key, bucket)
    }

    /// Build the HTTP client; on failure log why and return None.
    pub fn from_parts(base_url: &str, api_key: String, bucket: String) -> Option<Self> {
        let client = match reqwest::Client::builder().timeout(Duration::from_secs(20)).build() {
            Ok(c) => c,
            Err(e) => {
                error!(target: "backend", error = %e, "Failed to build hosted backend HTTP client");
                return None;
            }
        };
        Some(Self { client, base_url: base_url.trim_end_matches('/').to_string(), api_key, bucket })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header(USER_AGENT, UA)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn check(res: reqwest::Response, what: &str) -> AppResult<reqwest::Response> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        error!(target: "backend", %what, %status, body = %trunc_for_log(&body, 300), "Backend request failed");
        Err(AppError::Backend(format!("{what}: HTTP {status}")))
    }

    #[instrument(level = "debug", skip(self, query))]
    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> AppResult<Vec<T>> {
        let res = self
            .request(Method::GET, &format!("/rest/v1/{table}"))
            .query(&[("select", "*")])
            .query(query)
            .send()
            .await?;
        let rows: Vec<T> = Self::check(res, table).await?.json().await?;
        debug!(target: "backend", %table, rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    #[instrument(level = "debug", skip(self, rows), fields(rows = rows.len()))]
    async fn upsert<T: Serialize + Sync>(&self, table: &str, rows: &[T]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let res = self
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .query(&[("on_conflict", "id")])
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;
        Self::check(res, table).await?;
        Ok(())
    }

    #[instrument(level = "debug", skip(self, ids), fields(ids = ids.len()))]
    async fn delete_in(&self, table: &str, ids: &[String]) -> AppResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let res = self
            .request(Method::DELETE, &format!("/rest/v1/{table}"))
            .query(&[("id", in_list(ids))])
            .send()
            .await?;
        Self::check(res, table).await?;
        Ok(())
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

#[async_trait]
impl RecordStore for Supabase {
    async fn select_quizzes(&self, filter: &QuizFilter) -> AppResult<Vec<QuizRecord>> {
        let (col, val) = quiz_filter_param(filter);
        self.select(QUIZZES, &[(col, val), ("order", "created_at.asc".into())]).await
    }

    async fn upsert_quiz(&self, record: &QuizRecord) -> AppResult<()> {
        self.upsert(QUIZZES, std::slice::from_ref(record)).await
    }

    async fn delete_quiz(&self, id: &str) -> AppResult<()> {
        self.delete_in(QUIZZES, &[id.to_string()]).await
    }

    async fn select_personality_types(&self, quiz_id: &str) -> AppResult<Vec<PersonalityTypeRecord>> {
        self.select(PERSONALITY_TYPES, &[("quiz_id", format!("eq.{quiz_id}")), ("order", "order_index.asc".into())])
            .await
    }

    async fn upsert_personality_types(&self, records: &[PersonalityTypeRecord]) -> AppResult<()> {
        self.upsert(PERSONALITY_TYPES, records).await
    }

    async fn delete_personality_types(&self, ids: &[String]) -> AppResult<()> {
        self.delete_in(PERSONALITY_TYPES, ids).await
    }

    async fn select_questions(&self, quiz_id: &str) -> AppResult<Vec<QuestionRecord>> {
        self.select(QUESTIONS, &[("quiz_id", format!("eq.{quiz_id}")), ("order", "order_index.asc".into())])
            .await
    }

    async fn upsert_questions(&self, records: &[QuestionRecord]) -> AppResult<()> {
        self.upsert(QUESTIONS, records).await
    }

    async fn delete_questions(&self, ids: &[String]) -> AppResult<()> {
        self.delete_in(QUESTIONS, ids).await
    }

    async fn select_answers(&self, question_ids: &[String]) -> AppResult<Vec<AnswerRecord>> {
        if question_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(ANSWERS, &[("question_id", in_list(question_ids)), ("order", "order_index.asc".into())])
            .await
    }

    async fn upsert_answers(&self, records: &[AnswerRecord]) -> AppResult<()> {
        self.upsert(ANSWERS, records).await
    }

    async fn delete_answers(&self, ids: &[String]) -> AppResult<()> {
        self.delete_in(ANSWERS, ids).await
    }
}

#[async_trait]
impl BlobStore for Supabase {
    #[instrument(level = "info", skip(self, bytes), fields(size = bytes.len(), bucket = %self.bucket))]
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let res = self
            .request(Method::POST, &format!("/storage/v1/object/{}/{}", self.bucket, path))
            .header(CONTENT_TYPE, content_type)
            .header("cache-control", "3600")
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(res, "storage upload").await?;
        let url = self.public_url(path);
        info!(target: "backend", %path, "Uploaded blob");
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for Supabase {
    async fn current_user(&self, access_token: &str) -> AppResult<User> {
        let res = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header(USER_AGENT, UA)
            .header("apikey", &self.api_key)
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;
        if res.status() == reqwest::StatusCode::UNAUTHORIZED || res.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized);
        }
        let user: AuthUser = Self::check(res, "auth user").await?.json().await?;
        Ok(User { id: user.id, email: user.email })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_render_postgrest_syntax() {
        assert_eq!(in_list(&["a".into(), "b".into()]), "in.(\"a\",\"b\")");
        assert_eq!(quiz_filter_param(&QuizFilter::Slug("x".into())), ("slug", "eq.x".to_string()));
        assert_eq!(quiz_filter_param(&QuizFilter::Published), ("is_published", "eq.true".to_string()));
    }

    #[test]
    fn client_builds_from_parts() {
        let sb = Supabase::from_parts("http://127.0.0.1:54321/", "k".into(), "quiz-images".into()).expect("client");
        assert_eq!(sb.base_url, "http://127.0.0.1:54321");
        assert_eq!(sb.bucket, "quiz-images");
    }

    #[test]
    fn public_url_layout() {
        let sb = Supabase {
            client: reqwest::Client::new(),
            base_url: "http://127.0.0.1:54321".into(),
            api_key: "k".into(),
            bucket: "quiz-images".into(),
        };
        assert_eq!(
            sb.public_url("u1/covers/1-a.png"),
            "http://127.0.0.1:54321/storage/v1/object/public/quiz-images/u1/covers/1-a.png"
        );
    }
}
