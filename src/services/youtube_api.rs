// Primary search backend: YouTube Data API v3

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::SearchError;
use crate::ledger::WATCH_URL_PREFIX;
use crate::services::SearchBackend;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/search";

pub struct YouTubeApiSearch {
    client: reqwest::Client,
    api_key: String,
}

impl YouTubeApiSearch {
    pub fn new(api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl SearchBackend for YouTubeApiSearch {
    /// Top-1 video search. A 403 whose error body carries a quota reason
    /// becomes `QuotaExhausted`; everything else non-2xx is a plain failure.
    async fn search(&self, query: &str) -> Result<Option<String>, SearchError> {
        let url = format!(
            "{}?part=snippet&type=video&maxResults=1&q={}&key={}",
            SEARCH_ENDPOINT,
            urlencoding::encode(query),
            self.api_key
        );

        debug!("search-api: querying '{}'", query);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SearchError::Failed(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if is_quota_error(&body) {
                return Err(SearchError::QuotaExhausted);
            }
            return Err(SearchError::Failed(format!("HTTP {}: {}", status, body)));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchError::Failed(format!("bad response body: {}", e)))?;

        Ok(extract_video_url(&json))
    }
}

/// Recognize the Data API quota-exhaustion signature in an error body.
fn is_quota_error(body: &str) -> bool {
    let Ok(json) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let error = json.get("error");

    let reason_matches = error
        .and_then(|e| e.get("errors"))
        .and_then(Value::as_array)
        .is_some_and(|errors| {
            errors.iter().any(|e| {
                matches!(
                    e.get("reason").and_then(Value::as_str),
                    Some("quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded")
                )
            })
        });

    reason_matches
        || error
            .and_then(|e| e.get("status"))
            .and_then(Value::as_str)
            == Some("RESOURCE_EXHAUSTED")
}

fn extract_video_url(json: &Value) -> Option<String> {
    let video_id = json
        .get("items")
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .and_then(|item| item.get("id"))
        .and_then(|id| id.get("videoId"))
        .and_then(Value::as_str)?;
    Some(format!("{}{}", WATCH_URL_PREFIX, video_id))
}
