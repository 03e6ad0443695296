use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogItem, HistoryItem, Recommendation},
    services::{
        intent::{self, Intent},
        providers::NO_RECOMMENDATIONS_REPLY,
    },
    state::AppState,
};

const HELP_REPLY: &str = "I can show what you've watched, recommend titles based on \
your taste, summarize why they fit, and list trending or recently released picks. \
Try \"recommend me something\" or \"summarize my taste\".";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    /// Accepted as an alias for `message` for older clients
    pub user_input: Option<String>,
    /// Omitted on the first turn; the response carries the id to reuse
    pub session_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: Uuid,
}

/// Handler for the conversational endpoint.
///
/// Classifies the message into an intent, runs the matching pipeline
/// operation against the conversation's session, and returns a formatted
/// reply. Pipeline failures surface as empty-but-polite answers, never as
/// HTTP errors; only input validation produces a 400.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let message = request
        .message
        .or(request.user_input)
        .unwrap_or_default();
    let message = message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::InvalidInput("No message provided".to_string()));
    }

    let session_id = request.session_id.unwrap_or_else(Uuid::new_v4);
    let mut session = state.take_session(session_id).await;

    let intent = intent::classify(&message);
    tracing::info!(session = %session_id, intent = ?intent, "Dispatching chat turn");

    let response = match intent {
        Intent::Watched => watched_reply(&state.pipeline.fetch_watched(&mut session).await),
        Intent::Recommend => {
            recommendation_reply(&state.pipeline.recommend(&mut session, None).await)
        }
        Intent::Summarize => state.pipeline.summarize(&mut session).await,
        Intent::Trending => catalog_reply("Trending now", &state.pipeline.trending().await),
        Intent::Recent => catalog_reply("Recently released", &state.pipeline.recent().await),
        Intent::Help => HELP_REPLY.to_string(),
    };

    state.put_session(session_id, session).await;

    Ok(Json(ChatResponse {
        response,
        session_id,
    }))
}

fn watched_reply(items: &[HistoryItem]) -> String {
    if items.is_empty() {
        return "I couldn't find any watch history on the media server.".to_string();
    }

    let mut lines = vec!["**Recently watched:**".to_string()];
    for item in items {
        match item.year {
            Some(year) => lines.push(format!("* {} ({})", item.title, year)),
            None => lines.push(format!("* {}", item.title)),
        }
    }
    lines.join("\n")
}

fn recommendation_reply(items: &[Recommendation]) -> String {
    if items.is_empty() {
        return NO_RECOMMENDATIONS_REPLY.to_string();
    }

    let mut lines = vec!["**Recommended for you:**".to_string()];
    for item in items {
        let mut line = match &item.image_url {
            Some(url) => format!("* **{}** ([Image]({}))", item.name, url),
            None => format!("* **{}**", item.name),
        };
        if !item.genres.is_empty() {
            line.push_str(&format!(" _{}_", item.genres.join(", ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn catalog_reply(heading: &str, items: &[CatalogItem]) -> String {
    if items.is_empty() {
        return "Nothing to show from the media server right now.".to_string();
    }

    let mut lines = vec![format!("**{}:**", heading)];
    for item in items {
        let mut line = format!("* **{}**", item.name);
        if let Some(rating) = item.community_rating {
            line.push_str(&format!(" ({:.1})", rating));
        }
        if !item.genres.is_empty() {
            line.push_str(&format!(" _{}_", item.genres.join(", ")));
        }
        lines.push(line);
    }
    lines.join("\n")
}
