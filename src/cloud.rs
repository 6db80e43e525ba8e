use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use crate::config::constants::CLOUD_TIMEOUT_SECONDS;
use crate::error::{CloudError, FilamentSyncError, NetworkError, network_error};

/// Task status the vendor cloud reports for a completed print.
pub const TASK_STATUS_COMPLETED: i64 = 2;
/// Task status the vendor cloud reports for a failed print.
pub const TASK_STATUS_FAILED: i64 = 3;

/// A print job as recorded by the vendor cloud.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudTask {
    pub design_title: Option<String>,
    pub title: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub status: i64,
    /// Slicer-estimated total filament weight in grams.
    #[serde(rename = "weight", deserialize_with = "null_as_default")]
    pub total_weight_grams: f64,
    #[serde(rename = "amsDetailMapping", deserialize_with = "null_as_default")]
    pub filament_usage: Vec<FilamentUsage>,
}

impl CloudTask {
    pub fn display_title(&self) -> &str {
        self.design_title
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("untitled")
    }
}

/// Slicer estimate for one filament of a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilamentUsage {
    /// AMS slot, 1-indexed. Zero means the cloud did not say.
    #[serde(rename = "ams", deserialize_with = "null_as_default")]
    pub ams_slot: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub filament_type: String,
    #[serde(rename = "sourceColor", deserialize_with = "null_as_default")]
    pub source_color_code: String,
    #[serde(rename = "weight", deserialize_with = "null_as_default")]
    pub weight_grams: f64,
}

/// The cloud sends `null` for fields it has no value for; read those like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl FilamentUsage {
    /// The declared slot converted to 0-indexed form; missing means slot 0.
    pub fn slot_index(&self) -> i64 {
        self.ams_slot.max(1) - 1
    }
}

#[derive(Debug, Deserialize)]
struct TaskPage {
    #[serde(default)]
    hits: Vec<CloudTask>,
}

/// Source of the most recent cloud task for the printer.
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn latest_task(&self) -> Result<CloudTask, FilamentSyncError>;
}

/// Client for the vendor cloud's task history.
pub struct CloudTaskClient {
    pub api_url: String,
    device_id: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl CloudTaskClient {
    /// Create a client for one device.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the cloud API (e.g., "https://api.bambulab.com")
    /// * `device_id` - Printer serial number
    /// * `token` - Bearer token; without one every lookup fails fast
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        api_url: String,
        device_id: String,
        token: Option<String>,
    ) -> Result<Self, FilamentSyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLOUD_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| NetworkError::ClientSetup {
                reason: e.to_string(),
            })?;

        Ok(Self {
            api_url,
            device_id,
            token,
            client,
        })
    }

    pub fn tasks_url(&self) -> String {
        format!(
            "{}/v1/user-service/my/tasks?deviceId={}&limit=1",
            self.api_url, self.device_id
        )
    }
}

#[async_trait]
impl TaskSource for CloudTaskClient {
    /// Fetch the most recent task for this device.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No token is configured
    /// - The HTTP request fails or times out
    /// - The API returns an error status
    /// - The task list is empty
    async fn latest_task(&self) -> Result<CloudTask, FilamentSyncError> {
        let token = self.token.as_deref().ok_or(CloudError::MissingToken)?;
        let url = self.tasks_url();

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| network_error(&url, &e, CLOUD_TIMEOUT_SECONDS))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CloudError::ApiError {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let page: TaskPage = response
            .json()
            .await
            .map_err(|e| CloudError::InvalidResponse {
                reason: e.to_string(),
            })?;

        page.hits.into_iter().next().ok_or_else(|| {
            CloudError::NoTasks {
                device: self.device_id.clone(),
            }
            .into()
        })
    }
}
