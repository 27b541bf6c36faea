//! ERP relay client
//!
//! One HTTP POST per attendance record, bearer-token authorization,
//! bounded timeout. Fire and forget: a rejected or failed POST is
//! logged by the caller and the record is not queued for retry.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use shared::AttendanceRecord;

use crate::config::RelayConfig;
use crate::error::{BridgeError, BridgeResult};

/// Relay client for the ERP attendance endpoint
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    url: String,
    token: String,
}

impl RelayClient {
    /// Create a new RelayClient from configuration
    pub fn new(config: &RelayConfig) -> BridgeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
        })
    }

    /// Create a new RelayClient with a custom endpoint (for testing)
    pub fn with_base_url(url: String, token: String) -> Self {
        Self {
            client: Client::new(),
            url,
            token,
        }
    }

    /// POST one record to the ERP. HTTP 200 is the only success.
    pub async fn push_record(&self, record: &AttendanceRecord) -> BridgeResult<()> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&record.to_relay_payload())
            .send()
            .await?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(BridgeError::RelayRejected { status, body })
        }
    }
}
