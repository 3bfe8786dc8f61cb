//! HTTP client for the procurement service

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::{ProcurementConfig, ProcurementGateway, SubmitOutcome};
use crate::error::{Error, Result};
use crate::models::OrderBatch;

/// Procurement gateway over HTTP
#[derive(Debug, Clone)]
pub struct HttpProcurementClient {
    client: Client,
    base_url: String,
    heartbeat_url: Option<String>,
}

impl HttpProcurementClient {
    /// Build a client with the configured request and connect timeouts
    pub fn new(config: &ProcurementConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let heartbeat_url = config.heartbeat_url().map(str::to_string);
        match &heartbeat_url {
            Some(url) => info!(url = %url, "Procurement heartbeat enabled"),
            None => info!("Procurement heartbeat disabled, HEARTBEAT_URL not set"),
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            heartbeat_url,
        })
    }

    /// Whether each cycle pings a heartbeat URL
    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat_url.is_some()
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.base_url)
    }

    fn results_url(&self, library_id: &str) -> String {
        format!("{}/orders/{}", self.base_url, library_id)
    }
}

#[async_trait]
impl ProcurementGateway for HttpProcurementClient {
    async fn submit(&self, batch: &OrderBatch) -> Result<SubmitOutcome> {
        if batch.is_empty() {
            debug!(library_id = %batch.library_id, "Empty batch, nothing to submit");
            return Ok(SubmitOutcome::SkippedEmpty);
        }

        let url = self.orders_url();
        info!(url = %url, library_id = %batch.library_id, count = batch.len(), "Submitting order batch");

        let response = self.client.post(&url).json(batch).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "Order batch rejected");
            return Err(Error::RemoteRejection {
                stage: "submit",
                status: status.as_u16(),
            });
        }

        info!(library_id = %batch.library_id, count = batch.len(), "Order batch accepted");
        Ok(SubmitOutcome::Submitted)
    }

    async fn fetch_results(&self, library_id: &str) -> Result<String> {
        let url = self.results_url(library_id);
        debug!(url = %url, "Fetching order results");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "Order results request rejected");
            return Err(Error::RemoteRejection {
                stage: "fetch",
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(url = %url, bytes = body.len(), "Order results received");
        Ok(body)
    }

    async fn heartbeat(&self) -> Result<Option<u16>> {
        let Some(url) = self.heartbeat_url.as_deref() else {
            return Ok(None);
        };

        let response = self.client.get(url).send().await?;
        Ok(Some(response.status().as_u16()))
    }
}
