//! HTTP surface: health, stateless questions, transcripts, landing
//! redirect with visit counting, and basic stats.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ragbot_core::{messages, ChatEngine};
use ragbot_models::Role;
use ragbot_store::{ConversationStore, StoreError};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Clone)]
pub struct HttpState {
    pub engine: Arc<ChatEngine>,
    pub conversations: Arc<dyn ConversationStore>,
    /// Public bot name for the landing redirect; empty disables it.
    pub bot_name: String,
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/question", post(question))
        .route("/chat/:token", get(chat_page))
        .route("/stats", get(stats))
        .route("/", get(entry))
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct QuestionRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct QuestionResponse {
    answer: String,
}

/// Stateless composer: chat id 0, no history, nothing persisted.
async fn question(
    State(state): State<HttpState>,
    Json(req): Json<QuestionRequest>,
) -> Response {
    match state.engine.composer().answer(0, &req.question).await {
        Ok(answer) => Json(QuestionResponse { answer }).into_response(),
        Err(e) => {
            warn!(error = %e, "Stateless question failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn chat_page(State(state): State<HttpState>, Path(token): Path<String>) -> Response {
    let session = match state.conversations.session_by_token(&token).await {
        Ok(session) => session,
        Err(StoreError::TokenNotFound(_)) => {
            return (StatusCode::NOT_FOUND, "chat not found").into_response()
        }
        Err(e) => {
            warn!(error = %e, "Transcript lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response();
        }
    };

    match state.conversations.full_history(session.chat_id).await {
        Ok(history) => {
            let items: Vec<(Role, String)> = history
                .into_iter()
                .map(|item| (item.role, item.content))
                .collect();
            Html(render_transcript(session.name.as_deref(), &items)).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Transcript history load failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    unique_chats: i64,
    deals: i64,
    conversion: f64,
}

async fn stats(State(state): State<HttpState>) -> Response {
    let unique_chats = match state.conversations.count_unique_chats().await {
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Stats query failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "storage error").into_response();
        }
    };
    let deals = state
        .conversations
        .count_deals(messages::HISTORY_CALL_REQUESTED)
        .await
        .unwrap_or(0);
    let conversion = if unique_chats > 0 {
        deals as f64 / unique_chats as f64 * 100.0
    } else {
        0.0
    };
    Json(StatsResponse {
        unique_chats,
        deals,
        conversion,
    })
    .into_response()
}

/// Landing entry: record the visit, bounce to the bot.
async fn entry(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    let ip = header(&headers, "x-forwarded-for");
    let user_agent = header(&headers, "user-agent");
    let referer = header(&headers, "referer");
    if let Err(e) = state.conversations.add_visit(&ip, &user_agent, &referer).await {
        warn!(error = %e, "Failed to record visit");
    } else {
        info!(ip = %ip, "Landing visit recorded");
    }

    if state.bot_name.is_empty() {
        return StatusCode::OK.into_response();
    }
    Redirect::temporary(&format!("https://t.me/{}", state.bot_name)).into_response()
}

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn render_transcript(name: Option<&str>, history: &[(Role, String)]) -> String {
    let mut body = String::new();
    for (role, content) in history {
        let who = match role {
            Role::User => name.filter(|n| !n.is_empty()).unwrap_or("Пользователь"),
            Role::Assistant => "Помощник",
        };
        body.push_str(&format!(
            "<p><b>{}:</b> {}</p>\n",
            escape_html(who),
            escape_html(content)
        ));
    }
    format!(
        "<!DOCTYPE html>\n<html lang=\"ru\"><head><meta charset=\"utf-8\">\
         <title>История диалога</title></head>\n<body>\n<h1>История диалога</h1>\n{body}</body></html>"
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_escapes_and_labels_turns() {
        let history = vec![
            (Role::User, "цена < 1000 & скидка?".to_string()),
            (Role::Assistant, "Да".to_string()),
        ];
        let page = render_transcript(Some("Анна"), &history);
        assert!(page.contains("<b>Анна:</b> цена &lt; 1000 &amp; скидка?"));
        assert!(page.contains("<b>Помощник:</b> Да"));
    }

    #[test]
    fn anonymous_user_gets_generic_label() {
        let history = vec![(Role::User, "привет".to_string())];
        let page = render_transcript(None, &history);
        assert!(page.contains("<b>Пользователь:</b> привет"));
    }
}
