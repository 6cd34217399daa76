//! Raw reqwest client for the Lambda Cloud capacity and launch endpoints.
//!
//! Two calls only: list instance types with the regions that currently
//! have capacity, and launch a single instance. Every request uses basic
//! auth with the API key as username and an empty password.
//!
//! Only the listing is bounded by the request timeout. A launch the
//! provider has already accepted must not be abandoned and retried, so it
//! waits for the answer unless a launch timeout is configured.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use crate::config::LauncherConfig;
use crate::error::{LauncherError, Result};

// ── Constants ───────────────────────────────────────────────────────

const INSTANCE_TYPES_PATH: &str = "instance-types";
const LAUNCH_PATH: &str = "instance-operations/launch";

/// Longest error body kept in a `LauncherError::Status`.
const MAX_ERROR_BODY: usize = 512;

// ── Availability ────────────────────────────────────────────────────

/// A region entry from the instance-types listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
}

/// Capacity information for one instance type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceTypeAvailability {
    #[serde(default)]
    pub regions_with_capacity_available: Vec<Region>,
}

/// Response of `GET /instance-types`, keyed by instance type name.
///
/// Fetched fresh on every poll and dropped afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityCatalog {
    pub data: HashMap<String, InstanceTypeAvailability>,
}

impl AvailabilityCatalog {
    /// Regions with capacity for `instance_type`, in provider order.
    ///
    /// Empty when the type is not listed at all.
    pub fn regions(&self, instance_type: &str) -> &[Region] {
        self.data
            .get(instance_type)
            .map(|t| t.regions_with_capacity_available.as_slice())
            .unwrap_or(&[])
    }

    /// First region with capacity for `instance_type`, if any.
    pub fn first_region(&self, instance_type: &str) -> Option<&str> {
        self.regions(instance_type).first().map(|r| r.name.as_str())
    }
}

// ── Launch ──────────────────────────────────────────────────────────

/// Body of `POST /instance-operations/launch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
    pub region_name: String,
    pub instance_type_name: String,
    pub ssh_key_names: Vec<String>,
    pub quantity: u32,
}

impl LaunchRequest {
    /// A request for exactly one instance with a single SSH key.
    pub fn new(region: &str, instance_type: &str, ssh_key: &str) -> Self {
        Self {
            region_name: region.to_string(),
            instance_type_name: instance_type.to_string(),
            ssh_key_names: vec![ssh_key.to_string()],
            quantity: 1,
        }
    }
}

/// Provider response to a launch, kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchResult(pub Value);

impl std::fmt::Display for LaunchResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Provider abstraction ────────────────────────────────────────────

/// The two provider calls the control loop needs.
///
/// The loop talks to this trait instead of `LambdaClient` directly so it
/// can be driven by an in-memory provider.
pub trait CapacityApi: Send + Sync {
    fn fetch_availability(&self) -> impl Future<Output = Result<AvailabilityCatalog>> + Send;

    fn launch(&self, request: &LaunchRequest) -> impl Future<Output = Result<LaunchResult>> + Send;
}

// ── LambdaClient ────────────────────────────────────────────────────

/// HTTP client for the Lambda Cloud API.
pub struct LambdaClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    request_timeout: Duration,
    launch_timeout: Option<Duration>,
}

impl std::fmt::Debug for LambdaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LambdaClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl LambdaClient {
    /// Build a client with the configured base URL, key and timeouts.
    pub fn new(config: &LauncherConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_timeout: config.request_timeout,
            launch_timeout: config.launch_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl CapacityApi for LambdaClient {
    async fn fetch_availability(&self) -> Result<AvailabilityCatalog> {
        log::debug!("GET {}", self.url(INSTANCE_TYPES_PATH));
        let response = self
            .client
            .get(self.url(INSTANCE_TYPES_PATH))
            .basic_auth(&self.api_key, Some(""))
            .timeout(self.request_timeout)
            .send()
            .await?;

        decode_json(check_status(response).await?).await
    }

    async fn launch(&self, request: &LaunchRequest) -> Result<LaunchResult> {
        log::debug!("POST {}", self.url(LAUNCH_PATH));
        let mut builder = self
            .client
            .post(self.url(LAUNCH_PATH))
            .basic_auth(&self.api_key, Some(""))
            .header("content-type", "application/json")
            .json(request);
        if let Some(timeout) = self.launch_timeout {
            builder = builder.timeout(timeout);
        }
        let response = builder.send().await?;

        decode_json(check_status(response).await?).await
    }
}

/// Map non-success statuses to errors, auth failures separately.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(LauncherError::Unauthorized {
            status: status.as_u16(),
        });
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(LauncherError::Status {
        status: status.as_u16(),
        body: truncate(body, MAX_ERROR_BODY),
    })
}

async fn decode_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn truncate(mut s: String, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
        s.push_str("...");
    }
    s
}

// ── MockProvider for testing ────────────────────────────────────────


// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::mock::{catalog, MockProvider};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catalog_deserialization_ignores_extra_fields() {
        let body = json!({
            "data": {
                "gpu_1x_a6000": {
                    "instance_type": {"name": "gpu_1x_a6000", "price_cents_per_hour": 80},
                    "regions_with_capacity_available": [
                        {"name": "us-east-1", "description": "Virginia, USA"},
                        {"name": "us-west-2", "description": "Arizona, USA"}
                    ]
                },
                "gpu_1x_a100": {
                    "regions_with_capacity_available": []
                }
            }
        });
        let catalog: AvailabilityCatalog = serde_json::from_value(body).unwrap();
        assert_eq!(catalog.data.len(), 2);
        assert_eq!(catalog.regions("gpu_1x_a6000").len(), 2);
        assert_eq!(catalog.first_region("gpu_1x_a6000"), Some("us-east-1"));
        assert_eq!(catalog.first_region("gpu_1x_a100"), None);
    }

    #[test]
    fn test_catalog_missing_regions_field_is_empty() {
        let catalog: AvailabilityCatalog =
            serde_json::from_str(r#"{"data": {"gpu_1x_a6000": {}}}"#).unwrap();
        assert!(catalog.regions("gpu_1x_a6000").is_empty());
    }

    #[test]
    fn test_catalog_without_data_is_decode_error() {
        let err: LauncherError = serde_json::from_str::<AvailabilityCatalog>(r#"{"error": "x"}"#)
            .unwrap_err()
            .into();
        assert!(matches!(err, LauncherError::Decode(_)));
    }

    #[test]
    fn test_first_region_unknown_type() {
        let catalog = catalog("gpu_1x_a6000", &["us-east-1"]);
        assert_eq!(catalog.first_region("gpu_8x_h100_sxm5"), None);
        assert!(catalog.regions("gpu_8x_h100_sxm5").is_empty());
    }

    #[test]
    fn test_first_region_uses_provider_order() {
        let catalog = catalog("gpu_1x_a6000", &["us-west-2", "us-east-1", "europe-central-1"]);
        assert_eq!(catalog.first_region("gpu_1x_a6000"), Some("us-west-2"));
    }

    #[test]
    fn test_launch_request_serialization() {
        let req = LaunchRequest::new("us-east-1", "gpu_1x_a6000", "laptop");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({
                "region_name": "us-east-1",
                "instance_type_name": "gpu_1x_a6000",
                "ssh_key_names": ["laptop"],
                "quantity": 1
            })
        );
    }

    #[test]
    fn test_launch_result_is_transparent() {
        let result: LaunchResult = serde_json::from_str(r#"{"id":"abc123"}"#).unwrap();
        assert_eq!(result.0, json!({"id": "abc123"}));
        assert_eq!(serde_json::to_string(&result).unwrap(), r#"{"id":"abc123"}"#);
        assert_eq!(result.to_string(), r#"{"id":"abc123"}"#);
    }

    #[test]
    fn test_client_url_trims_trailing_slash() {
        let config = LauncherConfig {
            base_url: "http://127.0.0.1:9/api/v1/".into(),
            ..LauncherConfig::default()
        };
        let client = LambdaClient::new(&config).unwrap();
        assert_eq!(
            client.url(INSTANCE_TYPES_PATH),
            "http://127.0.0.1:9/api/v1/instance-types"
        );
        assert_eq!(
            client.url(LAUNCH_PATH),
            "http://127.0.0.1:9/api/v1/instance-operations/launch"
        );
    }

    #[test]
    fn test_client_debug_hides_key() {
        let config = LauncherConfig {
            api_key: "super-secret".into(),
            ..LauncherConfig::default()
        };
        let client = LambdaClient::new(&config).unwrap();
        assert!(!format!("{:?}", client).contains("super-secret"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short".into(), 10), "short");
        assert_eq!(truncate("abcdefghij".into(), 4), "abcd...");
        // multi-byte boundary
        assert_eq!(truncate("ééé".into(), 3), "é...");
    }

    #[tokio::test]
    async fn test_mock_provider_defaults_to_no_capacity() {
        let mock = MockProvider::new();
        let catalog = mock.fetch_availability().await.unwrap();
        assert!(catalog.data.is_empty());
        assert_eq!(mock.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_records_launches() {
        let mock = MockProvider::new();
        mock.push_launch(Ok(LaunchResult(json!({"id": "abc123"}))));
        let req = LaunchRequest::new("us-east-1", "gpu_1x_a6000", "laptop");
        let result = mock.launch(&req).await.unwrap();
        assert_eq!(result.0["id"], "abc123");
        assert_eq!(mock.launch_requests(), vec![req]);
    }
}
