/// Gemini-backed narrator
///
/// Pure pass-through: build a prompt from the watched and recommended titles,
/// call generateContent, hand back the text. Failures never cross the
/// narration boundary as errors; the caller always receives a string.
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    services::providers::{Narrator, NO_RECOMMENDATIONS_REPLY, REQUEST_TIMEOUT_SECS},
};

/// Titles beyond this prefix add prompt cost without adding signal.
const PROMPT_TITLE_CAP: usize = 5;

#[derive(Clone)]
pub struct GeminiNarrator {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

impl GeminiNarrator {
    pub fn new(api_key: String, api_url: String, model: String) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn build_prompt(watched: &[String], recommended: &[String]) -> String {
        let watched_list = watched
            .iter()
            .take(PROMPT_TITLE_CAP)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        let recommended_list = recommended
            .iter()
            .take(PROMPT_TITLE_CAP)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "I have watched these titles: {}.\n\
             And these titles were recommended to me: {}.\n\
             Based on this, analyze my taste and explain why these recommendations are a good fit.",
            watched_list, recommended_list
        )
    }

    async fn generate(&self, prompt: &str) -> AppResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_url, self.model
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "narrator returned status {}: {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::Upstream("narrator returned an empty response".to_string()))
    }
}

#[async_trait::async_trait]
impl Narrator for GeminiNarrator {
    async fn explain(&self, watched: Vec<String>, recommended: Vec<String>) -> String {
        if recommended.is_empty() {
            return NO_RECOMMENDATIONS_REPLY.to_string();
        }
        if watched.is_empty() {
            return "I don't have any watch history to base a taste summary on.".to_string();
        }

        let prompt = Self::build_prompt(&watched, &recommended);

        match self.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "Narration failed");
                format!("Narration unavailable: {}", e)
            }
        }
    }
}
