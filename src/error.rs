//! Error taxonomy.
//!
//! Validation and import errors block the save/import that raised them; backend errors
//! are logged where they happen and surfaced as a single failure. Stale responses during
//! scoring are not errors at all (see `scoring::Skipped`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Authoring-time validation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("quiz needs at least one question")]
    NoQuestions,

    #[error("quiz needs at least one personality type")]
    NoPersonalityTypes,

    #[error("question {question_id} has no answers")]
    QuestionWithoutAnswers { question_id: String },

    #[error("invalid slug '{0}': use lowercase letters, digits and hyphens")]
    InvalidSlug(String),

    #[error("answer {answer_id} in question {question_id} references unknown personality type '{personality_type}'")]
    UnresolvedPersonalityType {
        question_id: String,
        answer_id: String,
        personality_type: String,
    },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
}

/// Import document failures. Any of these leaves authoring state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportError {
    #[error("invalid quiz document: {0}")]
    InvalidFormat(String),

    #[error("answer references unknown personality type '{0}'")]
    UnknownPersonalityType(String),

    #[error("personality type '{0}' is declared more than once")]
    DuplicatePersonalityType(String),

    #[error("invalid slug '{0}'")]
    InvalidSlug(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("quiz has no personality types")]
    NoPersonalityTypes,

    #[error("quiz has no responses")]
    NoResponses,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Import(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Scoring(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Import(_) => "IMPORT_ERROR",
            Self::Scoring(_) => "SCORING_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Conflict(_) => "CONFLICT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        if self.is_server_error() {
            tracing::error!(target: "persona_quiz", error = %self, code, "Server error");
        } else {
            tracing::debug!(target: "persona_quiz", error = %self, code, "Client error");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}
