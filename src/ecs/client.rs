//! HTTP client for the ECS task metadata endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{ContainerMetadata, TaskMetadata};
use super::{AllotmentSource, EcsAllotment};
use crate::core::{Error, Result};

/// Client for the container metadata endpoint (v4).
///
/// Requests are issued one at a time and each is bounded by the timeout
/// given at construction.
#[derive(Clone, Debug)]
pub struct EcsMetadataClient {
    base_uri: String,
    client: reqwest::Client,
}

impl EcsMetadataClient {
    /// Create a client for the given discovery URI.
    ///
    /// # Arguments
    /// * `base_uri` - Value of `ECS_CONTAINER_METADATA_URI_V4`
    /// * `timeout` - Upper bound for each request, connect included
    pub fn new(base_uri: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::MetadataUnavailable(format!("failed to build client: {}", e)))?;

        Ok(Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Container-level metadata: `GET <uri>`.
    pub async fn container(&self, cancel: &CancellationToken) -> Result<ContainerMetadata> {
        self.get_json(&self.base_uri, cancel).await
    }

    /// Task-level metadata: `GET <uri>/task`.
    pub async fn task(&self, cancel: &CancellationToken) -> Result<TaskMetadata> {
        let url = format!("{}/task", self.base_uri);
        self.get_json(&url, cancel).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let request = async {
            let response = self.client.get(url).send().await?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                return Err(Error::MetadataUnavailable(format!(
                    "GET {} returned {}",
                    url, status
                )));
            }

            Ok::<T, Error>(response.json::<T>().await?)
        };

        // Dropping the request future aborts the in-flight call
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::MetadataUnavailable(format!(
                "GET {} cancelled",
                url
            ))),
            result = request => result,
        }
    }
}

#[async_trait]
impl AllotmentSource for EcsMetadataClient {
    async fn allotment(&self, cancel: &CancellationToken) -> Result<EcsAllotment> {
        let container = self.container(cancel).await?;
        let container_units = container.cpu_units();
        debug!(units = container_units, "ECS container CPU limit");

        // The task query is only needed when the container reports nothing
        if container_units > 0.0 {
            return Ok(EcsAllotment {
                container_units,
                task_units: 0.0,
            });
        }

        let task = self.task(cancel).await?;
        let task_units = task.cpu_units_for(container.docker_id.as_deref());
        debug!(units = task_units, "ECS task CPU limit");

        Ok(EcsAllotment {
            container_units,
            task_units,
        })
    }
}
