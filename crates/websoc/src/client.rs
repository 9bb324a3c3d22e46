//! HTTP client for a JSON-speaking WebSoc endpoint.
//!
//! The endpoint accepts a sub-query as a JSON body and answers with the
//! School → Department → Course → Section tree for that sub-query. The body is
//! decoded into [`RawPartialTree`] here so nothing downstream sees untyped data.

use crate::aggregate::SubQueryFetcher;
use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::types::{RawPartialTree, SubQuery};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Responses larger than this are not echoed into error messages.
const MAX_ERROR_BODY: usize = 512;

pub struct WebsocClient {
    client: Client,
    endpoint: Url,
}

impl WebsocClient {
    /// Creates a client from configuration.
    pub fn with_config(config: &ClientConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.base_url).map_err(|e| FetchError::Network {
            message: format!("Invalid WebSoc URL {}: {}", config.base_url, e),
        })?;

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FetchError::Network {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SubQueryFetcher for WebsocClient {
    async fn fetch(&self, query: &SubQuery) -> Result<RawPartialTree, FetchError> {
        debug!(url = %self.endpoint, sub_query = %query, "Requesting WebSoc");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        let tree: RawPartialTree = serde_json::from_str(&text)?;
        Ok(tree)
    }
}
