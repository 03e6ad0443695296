use serde::{Deserialize, Serialize};

/// Content kind served by a pipeline instance.
///
/// The original deployment ran separate movie and music assistants; the kind
/// parameterizes the media-server item type and the taste-graph URNs so one
/// pipeline covers both.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Movie,
    Music,
}

impl ContentKind {
    /// Media-server `IncludeItemTypes` value
    pub fn item_type(self) -> &'static str {
        match self {
            ContentKind::Movie => "Movie",
            ContentKind::Music => "Audio",
        }
    }

    /// Taste-graph entity URN for `filter.type`
    pub fn entity_urn(self) -> &'static str {
        match self {
            ContentKind::Movie => "urn:entity:movie",
            ContentKind::Music => "urn:entity:artist",
        }
    }

    /// Prefix for genre tag URNs
    pub fn tag_prefix(self) -> &'static str {
        match self {
            ContentKind::Movie => "urn:tag:genre:media:",
            ContentKind::Music => "urn:tag:genre:music:",
        }
    }
}

/// One consumed media record (movie watched, song played) from a user's
/// history. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryItem {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub source_user: String,
}

/// A single taste-graph recommendation.
///
/// `name` is the dedup key: two recommendations are the same entity iff their
/// names match exactly (case-sensitive). Genres are attached later by the
/// enrichment stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub name: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

impl Recommendation {
    /// Builds a recommendation from a raw insights entity.
    /// Entities without a name are malformed upstream data and are dropped.
    pub fn from_entity(entity: QlooEntity) -> Option<Self> {
        let name = entity.name.filter(|n| !n.is_empty())?;
        Some(Self {
            name,
            image_url: entity.properties.image.and_then(|image| image.url),
            genres: Vec::new(),
        })
    }
}

/// A media-server catalog entry used by the trending/recent views
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub genres: Vec<String>,
    pub community_rating: Option<f32>,
}

/// Caller-supplied filters that bypass history-derived signals entirely
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ExplicitFilters {
    pub genre: Option<String>,
    pub language: Option<String>,
}

impl ExplicitFilters {
    pub fn is_empty(&self) -> bool {
        self.genre.is_none() && self.language.is_none()
    }
}

/// Derived per-request taste parameters. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct TasteSignal {
    pub tag_urn: Option<String>,
    pub location: Option<String>,
    pub language: Option<String>,
}

/// One query against the taste-graph insights API
#[derive(Debug, Clone, PartialEq)]
pub struct InsightsQuery {
    pub entity_urn: String,
    pub year_floor: i32,
    pub tag: Option<String>,
    pub location: Option<String>,
    pub language: Option<String>,
}

// ============================================================================
// Media-server (Emby) API Types
// ============================================================================

/// User record from `GET /Users`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyUser {
    pub name: String,
    pub id: String,
}

/// Paged item listing from `GET /Users/{id}/Items` and `GET /Items`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyItemsPage {
    #[serde(default)]
    pub items: Vec<EmbyItem>,
}

/// Raw media-server item. Genre information may arrive in any of three
/// fields depending on the library's metadata provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyItem {
    pub name: Option<String>,
    pub id: Option<String>,
    pub production_year: Option<i32>,
    #[serde(default)]
    pub genres: Option<Vec<String>>,
    #[serde(default)]
    pub genre_items: Option<Vec<EmbyGenreItem>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    pub community_rating: Option<f32>,
}

/// Structured genre tag from the `GenreItems` field
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyGenreItem {
    pub name: Option<String>,
}

impl EmbyItem {
    /// Normalizes the three possible upstream genre fields into one list.
    /// Priority order: explicit genre list, then structured genre tags, then
    /// free-text tags. First non-empty source wins.
    pub fn normalized_genres(&self) -> Vec<String> {
        if let Some(genres) = &self.genres {
            if !genres.is_empty() {
                return genres.clone();
            }
        }
        if let Some(genre_items) = &self.genre_items {
            let names: Vec<String> = genre_items
                .iter()
                .filter_map(|genre| genre.name.clone())
                .collect();
            if !names.is_empty() {
                return names;
            }
        }
        self.tags.clone().unwrap_or_default()
    }

    /// Converts a raw record into a history item. Records without a name are
    /// dropped.
    pub fn into_history_item(self, source_user: &str) -> Option<HistoryItem> {
        let genres = self.normalized_genres();
        let title = self.name.filter(|n| !n.is_empty())?;
        Some(HistoryItem {
            id: self.id.unwrap_or_default(),
            title,
            year: self.production_year,
            genres,
            source_user: source_user.to_string(),
        })
    }
}

// ============================================================================
// Taste-graph (Qloo Insights) API Types
// ============================================================================

/// Envelope of `GET /v2/insights`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlooInsightsResponse {
    #[serde(default)]
    pub results: QlooResults,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlooResults {
    #[serde(default)]
    pub entities: Vec<QlooEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlooEntity {
    pub name: Option<String>,
    #[serde(default)]
    pub properties: QlooEntityProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QlooEntityProperties {
    pub image: Option<QlooImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QlooImage {
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_urns() {
        assert_eq!(ContentKind::Movie.entity_urn(), "urn:entity:movie");
        assert_eq!(ContentKind::Movie.tag_prefix(), "urn:tag:genre:media:");
        assert_eq!(ContentKind::Music.item_type(), "Audio");
    }

    #[test]
    fn test_normalized_genres_prefers_explicit_list() {
        let item = EmbyItem {
            genres: Some(vec!["Sci-Fi".to_string()]),
            genre_items: Some(vec![EmbyGenreItem {
                name: Some("Drama".to_string()),
            }]),
            tags: Some(vec!["space".to_string()]),
            ..Default::default()
        };

        assert_eq!(item.normalized_genres(), vec!["Sci-Fi".to_string()]);
    }

    #[test]
    fn test_normalized_genres_falls_back_to_genre_items() {
        let item = EmbyItem {
            genres: Some(vec![]),
            genre_items: Some(vec![
                EmbyGenreItem {
                    name: Some("Thriller".to_string()),
                },
                EmbyGenreItem { name: None },
            ]),
            tags: Some(vec!["heist".to_string()]),
            ..Default::default()
        };

        assert_eq!(item.normalized_genres(), vec!["Thriller".to_string()]);
    }

    #[test]
    fn test_normalized_genres_falls_back_to_tags() {
        let item = EmbyItem {
            genres: None,
            genre_items: None,
            tags: Some(vec!["noir".to_string(), "heist".to_string()]),
            ..Default::default()
        };

        assert_eq!(
            item.normalized_genres(),
            vec!["noir".to_string(), "heist".to_string()]
        );
    }

    #[test]
    fn test_normalized_genres_empty_when_all_sources_missing() {
        let item = EmbyItem::default();
        assert!(item.normalized_genres().is_empty());
    }

    #[test]
    fn test_emby_item_deserialization() {
        let json = r#"{
            "Name": "Inception",
            "Id": "abc123",
            "ProductionYear": 2010,
            "GenreItems": [{"Name": "Sci-Fi", "Id": 7}]
        }"#;

        let item: EmbyItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.name.as_deref(), Some("Inception"));
        assert_eq!(item.production_year, Some(2010));
        assert_eq!(item.normalized_genres(), vec!["Sci-Fi".to_string()]);
    }

    #[test]
    fn test_into_history_item_drops_nameless_records() {
        let item = EmbyItem {
            id: Some("abc".to_string()),
            ..Default::default()
        };
        assert!(item.into_history_item("alice").is_none());
    }

    #[test]
    fn test_into_history_item_keeps_source_user() {
        let item = EmbyItem {
            name: Some("Up".to_string()),
            id: Some("i9".to_string()),
            production_year: Some(2009),
            genres: Some(vec!["Comedy".to_string()]),
            ..Default::default()
        };

        let history = item.into_history_item("bob").unwrap();
        assert_eq!(history.title, "Up");
        assert_eq!(history.source_user, "bob");
        assert_eq!(history.year, Some(2009));
    }

    #[test]
    fn test_recommendation_from_entity() {
        let json = r#"{
            "name": "Dune",
            "properties": {"image": {"url": "https://img.example/dune.jpg"}}
        }"#;

        let entity: QlooEntity = serde_json::from_str(json).unwrap();
        let rec = Recommendation::from_entity(entity).unwrap();
        assert_eq!(rec.name, "Dune");
        assert_eq!(rec.image_url.as_deref(), Some("https://img.example/dune.jpg"));
        assert!(rec.genres.is_empty());
    }

    #[test]
    fn test_recommendation_from_entity_drops_nameless() {
        let entity = QlooEntity::default();
        assert!(Recommendation::from_entity(entity).is_none());

        let empty_name = QlooEntity {
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(Recommendation::from_entity(empty_name).is_none());
    }

    #[test]
    fn test_insights_response_tolerates_missing_fields() {
        let parsed: QlooInsightsResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.entities.is_empty());

        let parsed: QlooInsightsResponse =
            serde_json::from_str(r#"{"results": {"entities": [{"name": "RRR"}]}}"#).unwrap();
        assert_eq!(parsed.results.entities.len(), 1);
    }
}
