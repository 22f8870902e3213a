//! Client for the apartment energy usage open API.
//!
//! One call returns one month of readings for one complex. The service answers
//! with JSON normally, but quota and gateway errors come back as XML/plain
//! text, so the raw body is preserved when it is not JSON.

use std::time::Duration;

use energy_client::domain::RequestMonth;
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("failed to initialize energy API client: {0}")]
    Init(String),
    #[error("energy API request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Body of an API response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    /// Body that did not parse as JSON, verbatim.
    Text(String),
}

impl ApiResponse {
    pub fn from_body(body: String) -> Self {
        match serde_json::from_str(&body) {
            Ok(value) => ApiResponse::Json(value),
            Err(_) => ApiResponse::Text(body),
        }
    }
}

/// The fetch capability used by the collector loop.
#[async_trait::async_trait]
pub trait EnergyApi: Send + Sync {
    async fn fetch(&self, kapt_code: &str, month: RequestMonth) -> Result<ApiResponse, FetchError>;
}

pub struct HttpEnergyApi {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl HttpEnergyApi {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("energy-collector/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Init(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            service_key: service_key.into(),
        })
    }
}

#[async_trait::async_trait]
impl EnergyApi for HttpEnergyApi {
    async fn fetch(&self, kapt_code: &str, month: RequestMonth) -> Result<ApiResponse, FetchError> {
        let req_date = month.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("serviceKey", self.service_key.as_str()),
                ("kaptCode", kapt_code),
                ("reqDate", req_date.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            tracing::debug!(%status, kapt_code, month = %req_date, "energy API returned non-success status");
        }

        Ok(ApiResponse::from_body(body))
    }
}
