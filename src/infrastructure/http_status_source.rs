// Plant status endpoint client
use crate::application::status_poller::PlantStatusSource;
use crate::domain::plant_status::PlantStatus;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct HttpStatusSource {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

impl HttpStatusSource {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl PlantStatusSource for HttpStatusSource {
    async fn fetch_status(&self) -> Result<PlantStatus> {
        let response = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .context("Failed to reach plant status endpoint")?;

        if !response.status().is_success() {
            tracing::debug!(
                "Plant status endpoint {} returned {}",
                self.url,
                response.status()
            );
            return Ok(PlantStatus::Offline);
        }

        let body = response
            .json::<StatusBody>()
            .await
            .context("Failed to parse plant status response")?;

        Ok(PlantStatus::parse(&body.status).unwrap_or_else(|| {
            tracing::warn!("Unknown plant status '{}', treating as offline", body.status);
            PlantStatus::Offline
        }))
    }
}
