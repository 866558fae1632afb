//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Question, Quiz, QuizResponse};
use crate::records::QuizRecord;
use crate::scoring::ScoreSheet;
use crate::util::ImageKind;

/// Messages the client can send over WebSocket while taking a quiz.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    /// Start (or restart) a session by quiz id or slug.
    Start {
        #[serde(rename = "quizId", default)]
        quiz_id: Option<String>,
        #[serde(default)]
        slug: Option<String>,
    },
    Answer {
        #[serde(rename = "questionId")]
        question_id: String,
        #[serde(rename = "answerId")]
        answer_id: String,
    },
    Back,
    Abandon,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Question {
        #[serde(rename = "quizId")]
        quiz_id: String,
        title: String,
        position: usize,
        total: usize,
        question: PublicQuestion,
        /// Previously chosen answer when navigating back.
        #[serde(skip_serializing_if = "Option::is_none")]
        selected: Option<String>,
    },
    Result {
        #[serde(rename = "quizId")]
        quiz_id: String,
        sheet: ScoreSheet,
    },
    Abandoned,
    Error {
        message: String,
    },
}

/// Question as shown to a quiz-taker: no weights, no type links.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub answers: Vec<PublicAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAnswer {
    pub id: String,
    pub text: String,
}

pub fn to_public_question(q: &Question) -> PublicQuestion {
    PublicQuestion {
        id: q.id.clone(),
        text: q.text.clone(),
        image_url: q.image_url.clone(),
        answers: q
            .answers
            .iter()
            .map(|a| PublicAnswer { id: a.id.clone(), text: a.text.clone() })
            .collect(),
    }
}

/// Quiz ready for taking over HTTP.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayableQuiz {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub slug: String,
    pub questions: Vec<PublicQuestion>,
}

pub fn to_playable(q: &Quiz) -> PlayableQuiz {
    PlayableQuiz {
        id: q.id.clone(),
        title: q.title.clone(),
        description: q.description.clone(),
        cover_image_url: q.cover_image_url.clone(),
        slug: q.slug.clone(),
        questions: q.questions.iter().map(to_public_question).collect(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
    pub slug: String,
    pub is_published: bool,
    pub total_takes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub fn to_summary(r: &QuizRecord) -> QuizSummary {
    QuizSummary {
        id: r.id.clone(),
        title: r.title.clone(),
        description: r.description.clone(),
        cover_image_url: r.cover_image_url.clone(),
        slug: r.slug.clone(),
        is_published: r.is_published,
        total_takes: r.total_takes,
        created_at: r.created_at,
        updated_at: r.updated_at,
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub quiz_count: usize,
    pub published_count: usize,
    pub total_takes: u64,
}

pub fn dashboard_stats(records: &[QuizRecord]) -> DashboardStats {
    DashboardStats {
        quiz_count: records.len(),
        published_count: records.iter().filter(|r| r.is_published).count(),
        total_takes: records.iter().map(|r| r.total_takes).sum(),
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardOut {
    pub quizzes: Vec<QuizSummary>,
    pub stats: DashboardStats,
}

#[derive(Debug, Deserialize)]
pub struct ScoreIn {
    pub responses: Vec<QuizResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIn {
    pub kind: ImageKind,
    pub filename: String,
    pub content_type: String,
    pub data_base64: String,
}

#[derive(Debug, Serialize)]
pub struct ImageOut {
    pub url: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub backend: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::tests::sample_quiz;

    #[test]
    fn public_question_hides_scoring_fields() {
        let quiz = sample_quiz();
        let json = serde_json::to_value(to_playable(&quiz)).expect("json");
        let answer = &json["questions"][0]["answers"][0];
        assert_eq!(answer["id"], "a1");
        assert!(answer.get("weight").is_none());
        assert!(answer.get("personalityType").is_none());
    }

    #[test]
    fn ws_messages_use_tagged_snake_case() {
        let msg: ClientWsMessage =
            serde_json::from_str(r#"{"type":"answer","questionId":"q1","answerId":"a1"}"#).expect("parse");
        assert!(matches!(msg, ClientWsMessage::Answer { ref question_id, .. } if question_id == "q1"));
        let msg: ClientWsMessage = serde_json::from_str(r#"{"type":"start","slug":"x"}"#).expect("parse");
        assert!(matches!(msg, ClientWsMessage::Start { quiz_id: None, slug: Some(_) }));
        let out = serde_json::to_value(ServerWsMessage::Abandoned).expect("json");
        assert_eq!(out["type"], "abandoned");
    }

    #[test]
    fn stats_sum_takes() {
        let now = Utc::now();
        let rec = |published, takes| QuizRecord {
            id: "x".into(),
            owner_id: "o".into(),
            title: "t".into(),
            description: "d".into(),
            cover_image_url: None,
            is_published: published,
            slug: "s".into(),
            created_at: now,
            updated_at: now,
            total_takes: takes,
        };
        let stats = dashboard_stats(&[rec(true, 3), rec(false, 0), rec(true, 10)]);
        assert_eq!(stats, DashboardStats { quiz_count: 3, published_count: 2, total_takes: 13 });
    }
}
