//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs ids and basic result info.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{info, instrument};

use crate::backend::QuizFilter;
use crate::builder::QuizDraft;
use crate::domain::Quiz;
use crate::error::{AppError, AppResult};
use crate::logic;
use crate::protocol::*;
use crate::routes::auth::{AuthUser, MaybeAuthUser};
use crate::scoring::ScoreSheet;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthOut { ok: true, backend: state.backend.label })
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_published(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<QuizSummary>>> {
    let records = logic::list_published(&state.backend).await?;
    Ok(Json(records.iter().map(to_summary).collect()))
}

#[instrument(level = "info", skip(state, user), fields(user = %user.id))]
pub async fn http_my_quizzes(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<DashboardOut>> {
    let records = logic::list_owned(&state.backend, &user).await?;
    let stats = dashboard_stats(&records);
    Ok(Json(DashboardOut { quizzes: records.iter().map(to_summary).collect(), stats }))
}

#[instrument(level = "info", skip(state, user, draft), fields(user = %user.id, questions = draft.questions.len()))]
pub async fn http_create_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(mut draft): Json<QuizDraft>,
) -> AppResult<(StatusCode, Json<Quiz>)> {
    draft.quiz_id = None;
    let quiz = logic::save_quiz(&state, &user, draft).await?;
    info!(target: "quiz", id = %quiz.id, slug = %quiz.slug, "HTTP quiz created");
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[instrument(level = "info", skip(state, user, draft), fields(user = %user.id, %id))]
pub async fn http_update_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    Json(mut draft): Json<QuizDraft>,
) -> AppResult<Json<Quiz>> {
    draft.quiz_id = Some(id);
    let quiz = logic::save_quiz(&state, &user, draft).await?;
    info!(target: "quiz", id = %quiz.id, "HTTP quiz updated");
    Ok(Json(quiz))
}

#[instrument(level = "info", skip(state, viewer), fields(%id))]
pub async fn http_get_quiz(
    State(state): State<Arc<AppState>>,
    MaybeAuthUser(viewer): MaybeAuthUser,
    Path(id): Path<String>,
) -> AppResult<Json<Quiz>> {
    let quiz = logic::load_for_viewer(&state.backend, &id, viewer.as_ref()).await?;
    Ok(Json(quiz))
}

#[instrument(level = "info", skip(state, user), fields(user = %user.id, %id))]
pub async fn http_delete_quiz(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    logic::delete_quiz(&state.backend, &user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state), fields(%slug))]
pub async fn http_get_by_slug(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<PlayableQuiz>> {
    let quiz = logic::load_published(&state.backend, QuizFilter::Slug(slug)).await?;
    Ok(Json(to_playable(&quiz)))
}

#[instrument(level = "info", skip(state, body), fields(%id, responses = body.responses.len()))]
pub async fn http_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ScoreIn>,
) -> AppResult<Json<ScoreSheet>> {
    let sheet = logic::score_responses(&state, &id, &body.responses).await?;
    info!(target: "scoring", quiz_id = %id, winner = %sheet.winner.id, "HTTP score served");
    Ok(Json(sheet))
}

/// Body is the raw import document; the reconciled draft comes back unsaved.
#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_import(State(state): State<Arc<AppState>>, body: String) -> AppResult<Json<QuizDraft>> {
    let draft = logic::import_draft(&state, &body)?;
    Ok(Json(draft))
}

#[instrument(level = "info", skip(state, user, body), fields(user = %user.id, kind = ?body.kind, filename = %body.filename))]
pub async fn http_upload_image(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<ImageIn>,
) -> AppResult<Json<ImageOut>> {
    // Accept both bare base64 and data URLs.
    let data = body
        .data_base64
        .split_once("base64,")
        .map(|(_, d)| d)
        .unwrap_or(&body.data_base64);
    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| AppError::BadRequest(format!("invalid base64: {e}")))?;
    let url = logic::upload_image(&state, &user, body.kind, &body.filename, &body.content_type, bytes).await?;
    Ok(Json(ImageOut { url }))
}

/// Serves objects from stores that keep images themselves (the in-memory one).
#[instrument(level = "debug", skip(state), fields(%path))]
pub async fn http_get_blob(State(state): State<Arc<AppState>>, Path(path): Path<String>) -> AppResult<Response> {
    match state.backend.blobs.fetch(&path).await? {
        Some((content_type, bytes)) => Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response()),
        None => Err(AppError::NotFound(format!("blob '{path}'"))),
    }
}
