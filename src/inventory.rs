use std::time::Duration;

use async_trait::async_trait;
use log::{error, info};
use serde::Serialize;
use serde_json::Value;

use crate::config::constants::DEDUCTION_TIMEOUT_SECONDS;
use crate::error::{DeductionError, FilamentSyncError, NetworkError, network_error};

/// One deduction to apply to the inventory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub brand: String,
    #[serde(rename = "type")]
    pub filament_type: String,
    pub color: String,
    pub grams_used: f64,
    /// Slot the filament was drawn from; for logging only.
    #[serde(skip)]
    pub slot_index: u8,
}

/// Outcome of a deduction. Failures are values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum DeductionResult {
    Success(Value),
    Failure(String),
}

impl DeductionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DeductionResult::Success(_))
    }
}

/// Destination for computed usage.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn submit(&self, usage: &UsageRecord) -> DeductionResult;
}

/// Client for the inventory's deduction endpoint.
///
/// The inventory matches the record to a spool by brand, type and color,
/// subtracts the grams and may archive an emptied spool. None of that is
/// tracked here beyond the log line.
pub struct InventoryClient {
    pub api_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl InventoryClient {
    /// Create a new InventoryClient.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the inventory service
    /// * `api_key` - Value sent in the `X-API-Key` header
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_url: String, api_key: String) -> Result<Self, FilamentSyncError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEDUCTION_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| NetworkError::ClientSetup {
                reason: e.to_string(),
            })?;

        Ok(Self {
            api_url,
            api_key,
            client,
        })
    }

    pub fn deduct_url(&self) -> String {
        format!("{}/api/filaments/deduct", self.api_url)
    }
}

#[async_trait]
impl UsageSink for InventoryClient {
    /// Post one usage record.
    ///
    /// Logs the HTTP status (or `network_error`) with the response body or
    /// error message on failure. The caller is expected to carry on with its
    /// next record regardless.
    async fn submit(&self, usage: &UsageRecord) -> DeductionResult {
        if usage.grams_used <= 0.0 {
            let err = DeductionError::NonPositiveUsage {
                grams: usage.grams_used,
            };
            error!("Deduction skipped: {}", err);
            return DeductionResult::Failure(err.to_string());
        }

        let url = self.deduct_url();
        let response = match self
            .client
            .post(&url)
            .header("X-API-Key", &self.api_key)
            .json(usage)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = network_error(&url, &e, DEDUCTION_TIMEOUT_SECONDS);
                error!("Deduction failed (HTTP network_error): {}", err);
                return DeductionResult::Failure(err.to_string());
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let err = DeductionError::Rejected {
                status: status.as_u16(),
                body: body.clone(),
            };
            error!("Deduction failed: {}", err);
            return DeductionResult::Failure(body);
        }

        let data: Value = serde_json::from_str(&body).unwrap_or(Value::String(body));
        info!(
            "Deduction successful: {}g of {} {} ({}) {}",
            usage.grams_used, usage.brand, usage.filament_type, usage.color, data
        );
        DeductionResult::Success(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_to_wire_shape() {
        let usage = UsageRecord {
            brand: "Bambu Lab".to_string(),
            filament_type: "PLA".to_string(),
            color: "FFFFFFFF".to_string(),
            grams_used: 12.5,
            slot_index: 2,
        };
        assert_eq!(
            serde_json::to_value(&usage).unwrap(),
            json!({"brand": "Bambu Lab", "type": "PLA", "color": "FFFFFFFF", "grams_used": 12.5})
        );
    }

    #[tokio::test]
    async fn unreachable_inventory_is_a_failure_value() {
        let client = InventoryClient::new("http://127.0.0.1:9".to_string(), "key".to_string()).unwrap();
        let usage = UsageRecord {
            brand: "Bambu Lab".to_string(),
            filament_type: "PLA".to_string(),
            color: "Red".to_string(),
            grams_used: 1.0,
            slot_index: 0,
        };
        assert!(!client.submit(&usage).await.is_success());
    }

    #[tokio::test]
    async fn zero_usage_is_not_posted() {
        let client = InventoryClient::new("http://127.0.0.1:9".to_string(), "key".to_string()).unwrap();
        let usage = UsageRecord {
            brand: "Bambu Lab".to_string(),
            filament_type: "PLA".to_string(),
            color: "Red".to_string(),
            grams_used: 0.0,
            slot_index: 0,
        };
        match client.submit(&usage).await {
            DeductionResult::Failure(reason) => assert!(reason.contains("non-positive")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
