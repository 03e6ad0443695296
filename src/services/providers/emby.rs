/// Emby-compatible media-server provider
///
/// Covers the four server surfaces the pipeline needs:
/// 1. User directory: /Users -> resolve a name to an internal id
/// 2. Play history:   /Users/{id}/Items filtered to played items
/// 3. Title lookup:   /Items?SearchTerm=... for enrichment genre tags
/// 4. Catalog views:  /Users/{id}/Items/Latest and /Items for trending/recent
///
/// A misconfigured server URL typically answers with an HTML login page, so
/// responses are rejected on content type before JSON parsing is attempted.
use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::{
    error::{AppError, AppResult},
    models::{CatalogItem, ContentKind, EmbyItem, EmbyItemsPage, EmbyUser, HistoryItem},
    services::providers::{MediaServer, REQUEST_TIMEOUT_SECS},
};

const CATALOG_LIMIT: &str = "20";
const TITLE_SEARCH_LIMIT: &str = "5";

#[derive(Clone)]
pub struct EmbyServer {
    http_client: HttpClient,
    server_url: String,
    api_key: String,
    content_kind: ContentKind,
}

impl EmbyServer {
    pub fn new(server_url: String, api_key: String, content_kind: ContentKind) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            server_url: server_url.trim_end_matches('/').to_string(),
            api_key,
            content_kind,
        })
    }

    /// Builds the primary-image URL for a catalog item
    fn image_url(&self, item_id: &str) -> String {
        format!(
            "{}/Items/{}/Images/Primary?api_key={}",
            self.server_url, item_id, self.api_key
        )
    }

    fn catalog_item(&self, item: EmbyItem) -> Option<CatalogItem> {
        let genres = item.normalized_genres();
        let name = item.name.filter(|n| !n.is_empty())?;
        let id = item.id.filter(|i| !i.is_empty())?;
        let image_url = self.image_url(&id);
        Some(CatalogItem {
            id,
            name,
            image_url,
            genres,
            community_rating: item.community_rating,
        })
    }

    /// Validates a media-server response and parses its JSON body.
    async fn read_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> AppResult<T> {
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if content_type.contains("html") {
            return Err(AppError::Upstream(format!(
                "media server returned HTML instead of JSON for {}; check the server URL and API key",
                context
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "media server returned status {} for {}: {}",
                status, context, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            AppError::Upstream(format!(
                "failed to parse media server response for {}: {}",
                context, e
            ))
        })
    }
}

#[async_trait::async_trait]
impl MediaServer for EmbyServer {
    async fn resolve_user(&self, username: &str) -> AppResult<String> {
        let url = format!("{}/Users", self.server_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let users: Vec<EmbyUser> = self.read_json(response, "user list").await?;

        let wanted = username.to_lowercase();
        users
            .iter()
            .find(|user| user.name.to_lowercase() == wanted)
            .map(|user| user.id.clone())
            .ok_or_else(|| {
                AppError::UserNotFound(format!("no media server user named '{}'", username))
            })
    }

    async fn watched_items(&self, user_id: &str, username: &str) -> AppResult<Vec<HistoryItem>> {
        let url = format!("{}/Users/{}/Items", self.server_url, user_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("IncludeItemTypes", self.content_kind.item_type()),
                ("Recursive", "true"),
                ("SortBy", "DatePlayed"),
                ("SortOrder", "Descending"),
                ("Filters", "IsPlayed"),
                ("Fields", "Genres,GenreItems,Tags"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let page: EmbyItemsPage = self.read_json(response, "play history").await?;

        let items: Vec<HistoryItem> = page
            .items
            .into_iter()
            .filter_map(|item| item.into_history_item(username))
            .collect();

        tracing::info!(
            user = %username,
            items = items.len(),
            "Play history fetched"
        );

        Ok(items)
    }

    async fn genres_for_title(&self, title: &str) -> AppResult<Vec<String>> {
        let url = format!("{}/Items", self.server_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("SearchTerm", title),
                ("IncludeItemTypes", self.content_kind.item_type()),
                ("Recursive", "true"),
                ("Fields", "Genres,GenreItems,Tags"),
                ("Limit", TITLE_SEARCH_LIMIT),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let page: EmbyItemsPage = self.read_json(response, "title lookup").await?;

        // Only an exact name match counts; attaching a near-match's genres
        // would be worse than attaching none.
        Ok(page
            .items
            .into_iter()
            .find(|item| item.name.as_deref() == Some(title))
            .map(|item| item.normalized_genres())
            .unwrap_or_default())
    }

    async fn latest_additions(&self, user_id: &str) -> AppResult<Vec<CatalogItem>> {
        let url = format!("{}/Users/{}/Items/Latest", self.server_url, user_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("IncludeItemTypes", self.content_kind.item_type()),
                ("Fields", "Genres,CommunityRating"),
                ("Limit", CATALOG_LIMIT),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        // The Latest endpoint answers with a bare array, not an Items page.
        let items: Vec<EmbyItem> = self.read_json(response, "latest additions").await?;

        Ok(items
            .into_iter()
            .filter_map(|item| self.catalog_item(item))
            .collect())
    }

    async fn recent_releases(&self) -> AppResult<Vec<CatalogItem>> {
        let url = format!("{}/Items", self.server_url);

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("IncludeItemTypes", self.content_kind.item_type()),
                ("Recursive", "true"),
                ("SortBy", "PremiereDate"),
                ("SortOrder", "Descending"),
                ("Fields", "Genres,CommunityRating"),
                ("Limit", CATALOG_LIMIT),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let page: EmbyItemsPage = self.read_json(response, "recent releases").await?;

        Ok(page
            .items
            .into_iter()
            .filter_map(|item| self.catalog_item(item))
            .collect())
    }
}
