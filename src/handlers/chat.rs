//! # Chat Handler
//!
//! `POST /chat`: a rule-based responder. The message is lower-cased and
//! dispatched over an explicit, ordered list of (predicate, response-builder)
//! pairs; the first matching rule wins. Messages mentioning "chart" get a
//! canned bar-chart payload, messages mentioning "table" get a canned
//! two-row table, and everything else is echoed back.
//!
//! The rule list is deliberately a slice rather than an if/else chain so
//! that the match order stays explicit when new intents are added.

use crate::error::AppResult;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Incoming chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    /// Accepted for forward compatibility with per-session state; currently
    /// never read. Responses depend only on `message`.
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Chat reply. The optional data fields serialize as JSON `null` when not
/// populated, matching the frontend contract.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub chart_data: Option<Value>,
    pub table_data: Option<Value>,
}

impl ChatResponse {
    fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            chart_data: None,
            table_data: None,
        }
    }
}

/// One intent rule: a predicate over the lower-cased message and a builder
/// for the canned response.
struct IntentRule {
    matches: fn(&str) -> bool,
    respond: fn(&str) -> ChatResponse,
}

/// The intent table. Order matters: the first matching rule wins, so a
/// message containing both "chart" and "table" produces the chart payload.
const INTENT_RULES: &[IntentRule] = &[
    IntentRule {
        matches: |msg| msg.contains("chart"),
        respond: |_| ChatResponse {
            response: "Here is your chart!".to_string(),
            chart_data: Some(json!({"type": "bar", "data": [1, 2, 3, 4]})),
            table_data: None,
        },
    },
    IntentRule {
        matches: |msg| msg.contains("table"),
        respond: |_| ChatResponse {
            response: "Here is your table!".to_string(),
            chart_data: None,
            table_data: Some(json!([
                {"col1": "A", "col2": 1},
                {"col1": "B", "col2": 2}
            ])),
        },
    },
];

/// Build the reply for a chat message.
///
/// Pure function of the message text; no session state is consulted, so
/// identical input always yields identical output.
pub fn respond_to(message: &str) -> ChatResponse {
    let lowered = message.to_lowercase();

    for rule in INTENT_RULES {
        if (rule.matches)(&lowered) {
            return (rule.respond)(message);
        }
    }

    ChatResponse::text(format!("You said: {}", message))
}

/// `POST /chat` handler.
pub async fn chat(request: web::Json<ChatRequest>) -> AppResult<HttpResponse> {
    let request = request.into_inner();

    tracing::debug!(
        session_id = ?request.session_id,
        message_len = request.message.len(),
        "Chat message received"
    );

    Ok(HttpResponse::Ok().json(respond_to(&request.message)))
}
