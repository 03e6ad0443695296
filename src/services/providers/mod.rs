/// External data provider abstractions
///
/// This module defines the seams between the pipeline and its three upstream
/// dependencies: the media server (history + metadata), the taste-graph API
/// (recommendations), and the narrator (language model). Each is a trait so
/// the pipeline can be exercised against mocks.
use crate::{
    error::AppResult,
    models::{CatalogItem, HistoryItem, InsightsQuery, Recommendation},
};

pub mod emby;
pub mod gemini;
pub mod qloo;

/// Timeout applied to every external HTTP call. Expiry is treated the same
/// as any other network failure.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Reply used whenever the pipeline has nothing to recommend. A partial or
/// empty answer is preferred over a hard failure.
pub const NO_RECOMMENDATIONS_REPLY: &str =
    "I couldn't find any recommendations right now - the recommendation service \
     may be unavailable. Try again in a little while.";

/// Media-server abstraction (Emby-compatible)
///
/// All methods are read-only. Failures are returned as errors here and
/// absorbed into empty collections at the pipeline boundary.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaServer: Send + Sync {
    /// Resolves a user name to the server's internal user id.
    /// The match is exact but case-insensitive.
    async fn resolve_user(&self, username: &str) -> AppResult<String>;

    /// Fetches the user's played items, most recently played first.
    async fn watched_items(&self, user_id: &str, username: &str) -> AppResult<Vec<HistoryItem>>;

    /// Looks up genre tags for a title by exact-name search.
    async fn genres_for_title(&self, title: &str) -> AppResult<Vec<String>>;

    /// Recently added catalog entries for the trending view.
    async fn latest_additions(&self, user_id: &str) -> AppResult<Vec<CatalogItem>>;

    /// Recently released catalog entries.
    async fn recent_releases(&self) -> AppResult<Vec<CatalogItem>>;
}

/// Taste-graph recommendation source
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TasteGraph: Send + Sync {
    /// Runs one insights query. Entities without a name are dropped.
    async fn recommend(&self, query: InsightsQuery) -> AppResult<Vec<Recommendation>>;
}

/// Narration boundary: prompt in, free text out.
///
/// Implementations must never fail past this boundary; on any upstream
/// problem they return a literal error string instead.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Narrator: Send + Sync {
    async fn explain(&self, watched: Vec<String>, recommended: Vec<String>) -> String;
}
