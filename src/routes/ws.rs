//! WebSocket upgrade + quiz-taking loop. Each connection owns at most one
//! `TakeSession`; its responses disappear when the socket closes.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{info, error, instrument, debug};

use crate::backend::QuizFilter;
use crate::domain::Question;
use crate::logic::{finish_take, load_published};
use crate::protocol::{to_public_question, ClientWsMessage, ServerWsMessage};
use crate::session::{Step, TakeSession};
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "persona_quiz", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "persona_quiz", "WebSocket connected");
  let mut session: Option<TakeSession> = None;
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "persona_quiz", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "persona_quiz", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  if let Some(s) = &session {
    info!(target: "quiz", quiz_id = %s.quiz().id, answered = s.position(), "Discarding unfinished session");
  }
  info!(target: "persona_quiz", "WebSocket disconnected");
}

fn question_msg(s: &TakeSession, q: &Question, selected: Option<String>) -> ServerWsMessage {
  ServerWsMessage::Question {
    quiz_id: s.quiz().id.clone(),
    title: s.quiz().title.clone(),
    position: s.position(),
    total: s.total(),
    question: to_public_question(q),
    selected,
  }
}

fn error_msg(message: impl ToString) -> ServerWsMessage {
  ServerWsMessage::Error { message: message.to_string() }
}

pub(crate) async fn handle_client_ws(
  msg: ClientWsMessage,
  state: &AppState,
  session: &mut Option<TakeSession>,
) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::Start { quiz_id, slug } => {
      let filter = match (quiz_id, slug) {
        (Some(id), _) => QuizFilter::Id(id),
        (None, Some(slug)) => QuizFilter::Slug(slug),
        (None, None) => return error_msg("start needs quizId or slug"),
      };
      let quiz = match load_published(&state.backend, filter).await {
        Ok(q) => q,
        Err(e) => return error_msg(e),
      };
      match TakeSession::start(quiz, state.empty_policy()) {
        Ok(s) => {
          info!(target: "quiz", quiz_id = %s.quiz().id, total = s.total(), "WS session started");
          let reply = match s.current() {
            Some(q) => question_msg(&s, q, None),
            None => error_msg("quiz has no questions"),
          };
          *session = Some(s);
          reply
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::Answer { question_id, answer_id } => {
      let Some(s) = session.as_mut() else {
        return error_msg("no active session; send start first");
      };
      match s.answer(&question_id, &answer_id) {
        Ok(Step::Next { question, .. }) => question_msg(s, &question, None),
        Ok(Step::Finished(sheet)) => {
          let quiz_id = s.quiz().id.clone();
          *session = None;
          finish_take(&state.backend, &quiz_id).await;
          info!(target: "scoring", %quiz_id, winner = %sheet.winner.id, "WS session finished");
          ServerWsMessage::Result { quiz_id, sheet }
        }
        Err(e) => error_msg(e),
      }
    }

    ClientWsMessage::Back => {
      let Some(s) = session.as_mut() else {
        return error_msg("no active session");
      };
      match s.back() {
        Some((q, chosen)) => question_msg(s, &q, Some(chosen)),
        None => error_msg("already at the first question"),
      }
    }

    ClientWsMessage::Abandon => {
      if let Some(s) = session.take() {
        info!(target: "quiz", quiz_id = %s.quiz().id, answered = s.position(), "WS session abandoned");
      }
      ServerWsMessage::Abandoned
    }
  }
}
