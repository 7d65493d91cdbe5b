use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;
use crate::transcript::Step;

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
    timezone: &'a str,
}

/// One reasoning step as the backend sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct Thought {
    pub description: String,
    #[serde(default)]
    pub result: serde_json::Value,
}

impl From<Thought> for Step {
    fn from(thought: Thought) -> Self {
        // The backend stringifies Python values, so a missing result arrives as "None"
        let result = match thought.result {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() || s == "None" => None,
            serde_json::Value::String(s) => Some(s),
            other => Some(other.to_string()),
        };
        Step {
            description: thought.description,
            result,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    #[serde(default)]
    pub thoughts: Vec<Thought>,
    #[serde(rename = "highlightedQuery", default)]
    pub highlighted_query: Option<String>,
}

impl QueryResponse {
    pub fn steps(&self) -> Vec<Step> {
        self.thoughts.iter().cloned().map(Step::from).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub used: u32,
    pub limit: u32,
    pub remaining: i64,
}

impl Usage {
    /// Share of the limit used, clamped to 0..=100.
    pub fn percent(&self) -> u16 {
        if self.limit == 0 {
            return 100;
        }
        ((self.used as f64 / self.limit as f64) * 100.0).clamp(0.0, 100.0) as u16
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ResetInfo {
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Limits {
    pub search: Usage,
    pub weather: Usage,
    pub total: Usage,
    pub reset: ResetInfo,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct User {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_pic: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserInfo {
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone)]
pub struct NeubotClient {
    client: Client,
    base_url: String,
}

impl NeubotClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("neubot-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn query(&self, query: &str, timezone: &str) -> Result<QueryResponse, ApiError> {
        let url = format!("{}/api/query", self.base_url);
        debug!(%url, "sending query");

        let response = self
            .client
            .post(&url)
            .json(&QueryRequest { query, timezone })
            .send()
            .await?;

        Self::decode(response).await
    }

    pub async fn limits(&self) -> Result<Limits, ApiError> {
        let url = format!("{}/api/limits", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    pub async fn user(&self) -> Result<UserInfo, ApiError> {
        let url = format!("{}/api/user", self.base_url);
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}
