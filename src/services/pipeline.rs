use std::sync::Arc;

use crate::{
    config::Config,
    error::AppResult,
    models::{CatalogItem, ContentKind, ExplicitFilters, HistoryItem, InsightsQuery, Recommendation},
    services::{
        merge,
        providers::{MediaServer, Narrator, TasteGraph, NO_RECOMMENDATIONS_REPLY},
        signal,
    },
};

/// Per-conversation pipeline context.
///
/// Holds the last fetched history and last computed recommendations so
/// repeated turns within one conversation skip redundant upstream calls.
/// Each conversation owns its instance; sessions are never shared.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub watched: Vec<HistoryItem>,
    pub recommended: Vec<Recommendation>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The taste-aggregation and merge-recommendation pipeline.
///
/// History Fetcher -> Signal Extractor -> Recommendation Requester ->
/// Merge/Dedup -> Enrichment -> Narration. Every stage absorbs upstream
/// failures into empty collections; a partial answer always beats a hard
/// failure. Stages are stateless apart from the caller-owned [`Session`].
pub struct TastePipeline {
    media: Arc<dyn MediaServer>,
    taste: Arc<dyn TasteGraph>,
    narrator: Arc<dyn Narrator>,
    users: Vec<String>,
    location: Option<String>,
    fallback_genre: String,
    year_floor: i32,
    kind: ContentKind,
}

impl TastePipeline {
    pub fn new(
        media: Arc<dyn MediaServer>,
        taste: Arc<dyn TasteGraph>,
        narrator: Arc<dyn Narrator>,
        config: &Config,
    ) -> Self {
        let mut users = vec![config.media_user.clone()];
        if let Some(second) = &config.media_user_2 {
            users.push(second.clone());
        }

        Self {
            media,
            taste,
            narrator,
            users,
            location: config.user_location.clone(),
            fallback_genre: config.fallback_genre.clone(),
            year_floor: config.year_floor,
            kind: config.content_kind,
        }
    }

    /// Fetches played history for every configured user and refreshes the
    /// session cache. A user that cannot be resolved or fetched contributes
    /// nothing; "no history" is a valid outcome, not a failure.
    pub async fn fetch_watched(&self, session: &mut Session) -> Vec<HistoryItem> {
        let mut watched = Vec::new();

        for username in &self.users {
            match self.fetch_user_history(username).await {
                Ok(items) => watched.extend(items),
                Err(e) => {
                    tracing::warn!(
                        user = %username,
                        error = %e,
                        "History fetch failed, continuing without it"
                    );
                }
            }
        }

        session.watched = watched.clone();
        watched
    }

    async fn fetch_user_history(&self, username: &str) -> AppResult<Vec<HistoryItem>> {
        let user_id = self.media.resolve_user(username).await?;
        self.media.watched_items(&user_id, username).await
    }

    /// Returns the cached history, fetching it first if the session has none.
    async fn watched_or_fetch(&self, session: &mut Session) -> Vec<HistoryItem> {
        if session.watched.is_empty() {
            self.fetch_watched(session).await
        } else {
            session.watched.clone()
        }
    }

    /// Runs the full recommendation pipeline and caches the result on the
    /// session.
    ///
    /// General mode (no explicit filters) issues two independent queries:
    /// genre-only and location-only. The taste graph treats combined filters
    /// with AND semantics, which narrows results too far, so the views are
    /// queried separately and merged taste-first.
    pub async fn recommend(
        &self,
        session: &mut Session,
        explicit: Option<&ExplicitFilters>,
    ) -> Vec<Recommendation> {
        let watched = self.watched_or_fetch(session).await;
        let signal = signal::extract_signal(&watched, explicit, &self.fallback_genre, self.kind);

        let results = if explicit.map_or(false, |filters| !filters.is_empty()) {
            vec![
                self.query_or_empty(InsightsQuery {
                    entity_urn: self.kind.entity_urn().to_string(),
                    year_floor: self.year_floor,
                    tag: signal.tag_urn.clone(),
                    location: None,
                    language: signal.language.clone(),
                })
                .await,
            ]
        } else {
            let taste_query = InsightsQuery {
                entity_urn: self.kind.entity_urn().to_string(),
                year_floor: self.year_floor,
                tag: signal.tag_urn.clone(),
                location: None,
                language: None,
            };

            match &self.location {
                Some(location) => {
                    let location_query = InsightsQuery {
                        entity_urn: self.kind.entity_urn().to_string(),
                        year_floor: self.year_floor,
                        tag: None,
                        location: Some(location.clone()),
                        language: None,
                    };
                    // The queries are independent, so they run concurrently;
                    // merge order stays taste-first regardless of which
                    // finishes first.
                    let (taste_based, location_based) = tokio::join!(
                        self.query_or_empty(taste_query),
                        self.query_or_empty(location_query)
                    );
                    vec![taste_based, location_based]
                }
                None => vec![self.query_or_empty(taste_query).await],
            }
        };

        let merged = merge::merge(results);
        let enriched = self.enrich(merged).await;

        session.recommended = enriched.clone();
        enriched
    }

    /// One insights query with failure isolation: an error on one query must
    /// not block the results of the other.
    async fn query_or_empty(&self, query: InsightsQuery) -> Vec<Recommendation> {
        match self.taste.recommend(query).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Insights query failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Attaches media-server genre tags to each merged recommendation.
    /// A lookup miss leaves that item's genres empty and never aborts the
    /// remaining lookups; the list length is preserved.
    async fn enrich(&self, mut items: Vec<Recommendation>) -> Vec<Recommendation> {
        for item in &mut items {
            match self.media.genres_for_title(&item.name).await {
                Ok(genres) => item.genres = genres,
                Err(e) => {
                    tracing::debug!(title = %item.name, error = %e, "Genre lookup failed");
                }
            }
        }
        items
    }

    /// Narrates the user's taste and how the recommendations fit, lazily
    /// fetching history and recommendations if the session has neither.
    pub async fn summarize(&self, session: &mut Session) -> String {
        let watched = self.watched_or_fetch(session).await;

        if session.recommended.is_empty() {
            self.recommend(session, None).await;
        }
        if session.recommended.is_empty() {
            return NO_RECOMMENDATIONS_REPLY.to_string();
        }

        let watched_titles: Vec<String> = watched.iter().map(|item| item.title.clone()).collect();
        let recommended_titles: Vec<String> = session
            .recommended
            .iter()
            .map(|item| item.name.clone())
            .collect();

        self.narrator.explain(watched_titles, recommended_titles).await
    }

    /// Recently added catalog entries, resolved against the primary user.
    pub async fn trending(&self) -> Vec<CatalogItem> {
        let result: AppResult<Vec<CatalogItem>> = async {
            let user_id = self.media.resolve_user(&self.users[0]).await?;
            self.media.latest_additions(&user_id).await
        }
        .await;

        match result {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Trending fetch failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Recently released catalog entries.
    pub async fn recent(&self) -> Vec<CatalogItem> {
        match self.media.recent_releases().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Recent releases fetch failed, treating as empty");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::providers::{MockMediaServer, MockNarrator, MockTasteGraph};

    fn test_config() -> Config {
        Config {
            media_server_url: "http://emby.local".to_string(),
            media_api_key: "emby-key".to_string(),
            media_user: "alice".to_string(),
            media_user_2: None,
            taste_api_key: "qloo-key".to_string(),
            taste_api_url: "http://qloo.local".to_string(),
            gemini_api_key: "gemini-key".to_string(),
            gemini_api_url: "http://narrator.local".to_string(),
            gemini_model: "test-model".to_string(),
            user_location: Some("Chennai".to_string()),
            fallback_genre: "drama".to_string(),
            year_floor: 2020,
            content_kind: ContentKind::Movie,
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    fn history(title: &str, genres: &[&str]) -> HistoryItem {
        HistoryItem {
            id: "h1".to_string(),
            title: title.to_string(),
            year: Some(2010),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            source_user: "alice".to_string(),
        }
    }

    fn rec(name: &str) -> Recommendation {
        Recommendation {
            name: name.to_string(),
            image_url: None,
            genres: Vec::new(),
        }
    }

    fn pipeline(
        media: MockMediaServer,
        taste: MockTasteGraph,
        narrator: MockNarrator,
        config: &Config,
    ) -> TastePipeline {
        TastePipeline::new(Arc::new(media), Arc::new(taste), Arc::new(narrator), config)
    }

    #[tokio::test]
    async fn test_recommend_merges_taste_before_location_and_enriches() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));
        media
            .expect_genres_for_title()
            .returning(|_| Ok(vec!["Sci-Fi".to_string()]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .withf(|q| q.tag.is_some() && q.location.is_none())
            .returning(|_| Ok(vec![rec("Dune"), rec("Arrival")]));
        taste
            .expect_recommend()
            .withf(|q| q.tag.is_none() && q.location.as_deref() == Some("Chennai"))
            .returning(|_| Ok(vec![rec("Arrival"), rec("RRR")]));

        let config = test_config();
        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let mut session = Session::new();
        let recommendations = pipeline.recommend(&mut session, None).await;

        let names: Vec<&str> = recommendations.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Dune", "Arrival", "RRR"]);
        assert!(recommendations
            .iter()
            .all(|r| r.genres == vec!["Sci-Fi".to_string()]));
        assert_eq!(session.recommended, recommendations);
    }

    #[tokio::test]
    async fn test_recommend_uses_dominant_genre_tag() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Ok("u1".to_string()));
        media.expect_watched_items().returning(|_, _| {
            Ok(vec![
                history("Inception", &["Sci-Fi"]),
                history("Up", &["Sci-Fi", "Comedy"]),
            ])
        });
        media.expect_genres_for_title().returning(|_| Ok(vec![]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .withf(|q| q.tag.as_deref() == Some("urn:tag:genre:media:sci-fi"))
            .returning(|_| Ok(vec![rec("Dune")]));
        taste
            .expect_recommend()
            .withf(|q| q.location.is_some())
            .returning(|_| Ok(vec![]));

        let config = test_config();
        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let recommendations = pipeline.recommend(&mut Session::new(), None).await;
        assert_eq!(recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_still_recommends_via_fallback_genre() {
        let mut media = MockMediaServer::new();
        media.expect_resolve_user().returning(|name| {
            Err(AppError::UserNotFound(format!(
                "no media server user named '{}'",
                name
            )))
        });
        media.expect_genres_for_title().returning(|_| Ok(vec![]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .withf(|q| q.tag.as_deref() == Some("urn:tag:genre:media:drama"))
            .returning(|_| Ok(vec![rec("Anatomy of a Fall")]));
        taste
            .expect_recommend()
            .withf(|q| q.location.is_some())
            .returning(|_| Ok(vec![]));

        let config = test_config();
        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let mut session = Session::new();
        let recommendations = pipeline.recommend(&mut session, None).await;

        assert!(session.watched.is_empty());
        assert_eq!(recommendations.len(), 1);
        assert_eq!(recommendations[0].name, "Anatomy of a Fall");
    }

    #[tokio::test]
    async fn test_failed_queries_yield_empty_list_and_no_recommendations_reply() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .returning(|_| Err(AppError::Upstream("status 500".to_string())));

        // The narrator must not be called when there is nothing to narrate.
        let narrator = MockNarrator::new();

        let config = test_config();
        let pipeline = pipeline(media, taste, narrator, &config);

        let mut session = Session::new();
        let reply = pipeline.summarize(&mut session).await;

        assert!(session.recommended.is_empty());
        assert_eq!(reply, NO_RECOMMENDATIONS_REPLY);
    }

    #[tokio::test]
    async fn test_enrichment_failure_never_drops_items() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));
        media
            .expect_genres_for_title()
            .withf(|title| title == "Dune")
            .returning(|_| Err(AppError::Upstream("lookup failed".to_string())));
        media
            .expect_genres_for_title()
            .withf(|title| title == "Arrival")
            .returning(|_| Ok(vec!["Sci-Fi".to_string()]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .withf(|q| q.tag.is_some())
            .returning(|_| Ok(vec![rec("Dune"), rec("Arrival")]));
        taste
            .expect_recommend()
            .withf(|q| q.location.is_some())
            .returning(|_| Ok(vec![]));

        let config = test_config();
        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let recommendations = pipeline.recommend(&mut Session::new(), None).await;

        assert_eq!(recommendations.len(), 2);
        assert!(recommendations[0].genres.is_empty());
        assert_eq!(recommendations[1].genres, vec!["Sci-Fi".to_string()]);
    }

    #[tokio::test]
    async fn test_session_cache_skips_second_fetch() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .times(1)
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .times(1)
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));
        media.expect_genres_for_title().returning(|_| Ok(vec![]));

        let mut taste = MockTasteGraph::new();
        taste.expect_recommend().returning(|_| Ok(vec![rec("Dune")]));

        let config = test_config();
        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let mut session = Session::new();
        pipeline.recommend(&mut session, None).await;
        // Second run reuses the cached history; the mock's times(1) would
        // fail otherwise.
        pipeline.recommend(&mut session, None).await;
    }

    #[tokio::test]
    async fn test_explicit_fetch_refreshes_session_cache() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .times(2)
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .times(2)
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));

        let config = test_config();
        let pipeline = pipeline(media, MockTasteGraph::new(), MockNarrator::new(), &config);

        let mut session = Session::new();
        pipeline.fetch_watched(&mut session).await;
        pipeline.fetch_watched(&mut session).await;
        assert_eq!(session.watched.len(), 1);
    }

    #[tokio::test]
    async fn test_explicit_filters_issue_single_query() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));
        media.expect_genres_for_title().returning(|_| Ok(vec![]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .times(1)
            .withf(|q| {
                q.tag.as_deref() == Some("urn:tag:genre:media:comedy")
                    && q.location.is_none()
                    && q.language.as_deref() == Some("hindi")
            })
            .returning(|_| Ok(vec![rec("Dune")]));

        let config = test_config();
        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let filters = ExplicitFilters {
            genre: Some("Comedy".to_string()),
            language: Some("hindi".to_string()),
        };
        let recommendations = pipeline
            .recommend(&mut Session::new(), Some(&filters))
            .await;
        assert_eq!(recommendations.len(), 1);
    }

    #[tokio::test]
    async fn test_couple_mode_combines_both_histories() {
        let mut config = test_config();
        config.media_user_2 = Some("bob".to_string());
        config.user_location = None;

        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .withf(|name| name == "alice")
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_resolve_user()
            .withf(|name| name == "bob")
            .returning(|_| Ok("u2".to_string()));
        media
            .expect_watched_items()
            .withf(|_, name| name == "alice")
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));
        media
            .expect_watched_items()
            .withf(|_, name| name == "bob")
            .returning(|_, _| {
                Ok(vec![
                    history("Notting Hill", &["Romance"]),
                    history("About Time", &["Romance"]),
                ])
            });
        media.expect_genres_for_title().returning(|_| Ok(vec![]));

        let mut taste = MockTasteGraph::new();
        taste
            .expect_recommend()
            .times(1)
            .withf(|q| q.tag.as_deref() == Some("urn:tag:genre:media:romance"))
            .returning(|_| Ok(vec![rec("Past Lives")]));

        let pipeline = pipeline(media, taste, MockNarrator::new(), &config);

        let mut session = Session::new();
        let recommendations = pipeline.recommend(&mut session, None).await;
        assert_eq!(session.watched.len(), 3);
        assert_eq!(recommendations[0].name, "Past Lives");
    }

    #[tokio::test]
    async fn test_summarize_passes_titles_to_narrator() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Ok("u1".to_string()));
        media
            .expect_watched_items()
            .returning(|_, _| Ok(vec![history("Inception", &["Sci-Fi"])]));
        media.expect_genres_for_title().returning(|_| Ok(vec![]));

        let mut taste = MockTasteGraph::new();
        taste.expect_recommend().returning(|_| Ok(vec![rec("Dune")]));

        let mut narrator = MockNarrator::new();
        narrator
            .expect_explain()
            .withf(|watched, recommended| {
                watched == &["Inception".to_string()] && recommended == &["Dune".to_string()]
            })
            .returning(|_, _| "You enjoy cerebral sci-fi.".to_string());

        let config = test_config();
        let pipeline = pipeline(media, taste, narrator, &config);

        let reply = pipeline.summarize(&mut Session::new()).await;
        assert_eq!(reply, "You enjoy cerebral sci-fi.");
    }

    #[tokio::test]
    async fn test_trending_absorbs_failures() {
        let mut media = MockMediaServer::new();
        media
            .expect_resolve_user()
            .returning(|_| Err(AppError::Upstream("down".to_string())));

        let config = test_config();
        let pipeline = pipeline(media, MockTasteGraph::new(), MockNarrator::new(), &config);

        assert!(pipeline.trending().await.is_empty());
    }
}
