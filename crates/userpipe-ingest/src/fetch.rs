//! Extract stage: one page of users from the random user API

use crate::config::SourceConfig;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};
use userpipe_common::{PipelineError, RawUserRecord, Result};

const USER_AGENT: &str = concat!("userpipe/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the upstream user generator
pub struct UserFetcher {
    client: Client,
    config: SourceConfig,
}

impl UserFetcher {
    /// Create a fetcher; no timeout beyond reqwest's defaults is applied
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client, config })
    }

    /// Fetch one page of raw user records.
    ///
    /// Performs exactly one GET. Network errors, non-success statuses and
    /// bodies without a `results` array all propagate; there is no retry.
    #[instrument(skip(self), fields(url = %self.config.url, page_size = self.config.page_size))]
    pub async fn fetch(&self) -> Result<Vec<RawUserRecord>> {
        info!("Fetching random users");

        let response = self
            .client
            .get(&self.config.url)
            .query(&[("results", self.config.page_size)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::UpstreamStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.bytes().await?;
        debug!(bytes = body.len(), "Received upstream payload");

        let users = extract_results(serde_json::from_slice(&body)?)?;
        info!(records = users.len(), "Fetched raw user batch");

        Ok(users)
    }
}

/// Pull the `results` array out of an API response document
pub fn extract_results(document: Value) -> Result<Vec<RawUserRecord>> {
    match document {
        Value::Object(mut fields) => match fields.remove("results") {
            Some(Value::Array(users)) => Ok(users),
            _ => Err(PipelineError::MissingResults),
        },
        _ => Err(PipelineError::MissingResults),
    }
}
