use axum::{
    extract::{Query, State},
    Json,
};

use crate::{
    models::{CatalogItem, ExplicitFilters, HistoryItem, Recommendation},
    services::pipeline::Session,
    state::AppState,
};

/// Stateless view of the configured users' watch history
pub async fn watched(State(state): State<AppState>) -> Json<Vec<HistoryItem>> {
    let mut session = Session::new();
    Json(state.pipeline.fetch_watched(&mut session).await)
}

/// Stateless run of the full recommendation pipeline.
///
/// Optional `genre` and `language` query parameters take precedence over the
/// history-derived signal entirely.
pub async fn recommendations(
    State(state): State<AppState>,
    Query(filters): Query<ExplicitFilters>,
) -> Json<Vec<Recommendation>> {
    let mut session = Session::new();
    let explicit = if filters.is_empty() {
        None
    } else {
        Some(&filters)
    };
    Json(state.pipeline.recommend(&mut session, explicit).await)
}

/// Recently added catalog entries
pub async fn trending(State(state): State<AppState>) -> Json<Vec<CatalogItem>> {
    Json(state.pipeline.trending().await)
}

/// Recently released catalog entries
pub async fn recent(State(state): State<AppState>) -> Json<Vec<CatalogItem>> {
    Json(state.pipeline.recent().await)
}
