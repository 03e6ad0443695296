/// Taste-graph provider backed by the Qloo Insights API
///
/// One method, one endpoint: GET /v2/insights with an x-api-key header and
/// whichever of {tag, location, language} the query carries. The caller
/// decides how many queries to issue and in what order to merge them.
use std::time::Duration;

use reqwest::Client as HttpClient;

use crate::{
    error::{AppError, AppResult},
    models::{InsightsQuery, QlooInsightsResponse, Recommendation},
    services::providers::{TasteGraph, REQUEST_TIMEOUT_SECS},
};

#[derive(Clone)]
pub struct QlooInsights {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl QlooInsights {
    pub fn new(api_key: String, api_url: String) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn query_params(query: &InsightsQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("filter.type", query.entity_urn.clone()),
            ("filter.release_year.min", query.year_floor.to_string()),
        ];
        if let Some(tag) = &query.tag {
            params.push(("filter.tags", tag.clone()));
        }
        if let Some(location) = &query.location {
            params.push(("signal.location.query", location.clone()));
        }
        if let Some(language) = &query.language {
            params.push(("filter.language", language.clone()));
        }
        params
    }
}

#[async_trait::async_trait]
impl TasteGraph for QlooInsights {
    async fn recommend(&self, query: InsightsQuery) -> AppResult<Vec<Recommendation>> {
        let url = format!("{}/v2/insights", self.api_url);
        let params = Self::query_params(&query);

        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "taste graph returned status {}: {}",
                status, body
            )));
        }

        let parsed: QlooInsightsResponse = response.json().await?;

        let recommendations: Vec<Recommendation> = parsed
            .results
            .entities
            .into_iter()
            .filter_map(Recommendation::from_entity)
            .collect();

        tracing::info!(
            tag = ?query.tag,
            location = ?query.location,
            results = recommendations.len(),
            "Insights query completed"
        );

        Ok(recommendations)
    }
}
