//! Device-management API client.
//!
//! [`ChannelApi`] is the seam the deploy pipeline talks to. Calls return the
//! raw status and body; interpreting statuses (and retrying) is up to the
//! caller, because each endpoint has its own notion of success.

use crate::config::DeploySettings;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Status and body of an API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// A driver id and version pair, as used by channel assignments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverVersion {
    /// Driver id.
    #[serde(rename = "driverId")]
    pub driver_id: String,
    /// Driver version.
    pub version: String,
}

/// Operations against the device-management API.
pub trait ChannelApi: Send + Sync {
    /// Lists the drivers currently assigned to `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    fn list_channel_drivers(&self, channel_id: &str) -> Result<ApiResponse>;

    /// Looks up the details of one driver version.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    fn search_driver(&self, driver: &DriverVersion) -> Result<ApiResponse>;

    /// Uploads a zipped driver package.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    fn upload_package(&self, archive: &[u8]) -> Result<ApiResponse>;

    /// Replaces the channel's driver assignments.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be sent.
    fn bulk_update(&self, channel_id: &str, drivers: &[DriverVersion]) -> Result<ApiResponse>;
}

#[derive(Debug, Deserialize)]
struct Items {
    #[serde(default)]
    items: Vec<Value>,
}

fn items(operation: &str, body: &str) -> Result<Vec<Value>> {
    serde_json::from_str::<Items>(body)
        .map(|parsed| parsed.items)
        .map_err(|e| Error::operation(operation, e))
}

/// Parses a channel listing into the drivers that carry both an id and a
/// version.
///
/// # Errors
///
/// Returns an error if the body is not an `items` document.
pub fn parse_channel_drivers(body: &str) -> Result<Vec<DriverVersion>> {
    Ok(items("parse_channel_drivers", body)?
        .into_iter()
        .filter_map(|item| serde_json::from_value::<DriverVersion>(item).ok())
        .collect())
}

/// Extracts the `packageKey` of the first search result, if any.
///
/// # Errors
///
/// Returns an error if the body is not an `items` document.
pub fn parse_package_key(body: &str) -> Result<Option<String>> {
    Ok(items("parse_driver_search", body)?
        .first()
        .and_then(|item| item.get("packageKey"))
        .and_then(Value::as_str)
        .map(str::to_string))
}

/// Parses the driver id and version of an uploaded package.
///
/// # Errors
///
/// Returns an error if the body lacks `driverId` or `version`.
pub fn parse_uploaded(body: &str) -> Result<DriverVersion> {
    serde_json::from_str(body).map_err(|e| Error::operation("parse_upload_response", e))
}

/// Blocking HTTP implementation of [`ChannelApi`].
pub struct HttpChannelClient {
    client: reqwest::blocking::Client,
    base_url: String,
    token: SecretString,
    accept: String,
    log_level: String,
}

impl HttpChannelClient {
    /// Creates a client for the environment at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        settings: &DeploySettings,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(format!("driverci/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::operation("build_http_client", e))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            accept: settings.accept.clone(),
            log_level: settings.api_log_level.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(
        &self,
        method: reqwest::Method,
        path: &str,
    ) -> reqwest::blocking::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("Accept", &self.accept)
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .header("X-ST-LOG-LEVEL", &self.log_level)
    }

    fn send(operation: &str, request: reqwest::blocking::RequestBuilder) -> Result<ApiResponse> {
        let response = request
            .send()
            .map_err(|e| Error::operation(operation, format!("HTTP request failed: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| Error::operation(operation, format!("reading response body: {e}")))?;
        debug!(operation, status, "API response");
        Ok(ApiResponse { status, body })
    }
}

impl ChannelApi for HttpChannelClient {
    fn list_channel_drivers(&self, channel_id: &str) -> Result<ApiResponse> {
        Self::send(
            "list_channel_drivers",
            self.request(
                reqwest::Method::GET,
                &format!("/channels/{channel_id}/drivers"),
            ),
        )
    }

    fn search_driver(&self, driver: &DriverVersion) -> Result<ApiResponse> {
        let body = serde_json::json!({
            "driverId": driver.driver_id,
            "driverVersion": driver.version,
        });
        Self::send(
            "search_driver",
            self.request(reqwest::Method::POST, "/drivers/search")
                .json(&body),
        )
    }

    fn upload_package(&self, archive: &[u8]) -> Result<ApiResponse> {
        Self::send(
            "upload_package",
            self.request(reqwest::Method::POST, "/drivers/package")
                .header("Content-Type", "application/zip")
                .body(archive.to_vec()),
        )
    }

    fn bulk_update(&self, channel_id: &str, drivers: &[DriverVersion]) -> Result<ApiResponse> {
        Self::send(
            "bulk_update",
            self.request(
                reqwest::Method::PUT,
                &format!("/channels/{channel_id}/drivers/bulk"),
            )
            .json(drivers),
        )
    }
}

/// Mock API for testing.
#[cfg(test)]
pub struct MockChannelApi {
    /// Response to the channel listing.
    pub listing: ApiResponse,
    /// Search responses by driver id; missing ids answer 404.
    pub searches: std::collections::HashMap<String, ApiResponse>,
    /// Upload responses, consumed in order; 500 once exhausted.
    pub uploads: std::sync::Mutex<std::collections::VecDeque<ApiResponse>>,
    /// Response to the bulk update.
    pub bulk: ApiResponse,
    /// Sizes of uploaded archives.
    pub uploaded: std::sync::Mutex<Vec<usize>>,
    /// Assignments sent to the bulk update.
    pub assigned: std::sync::Mutex<Vec<DriverVersion>>,
}

#[cfg(test)]
impl MockChannelApi {
    /// Creates a mock with an empty listing and a successful bulk update.
    pub fn new() -> Self {
        Self {
            listing: ApiResponse {
                status: 200,
                body: r#"{"items": []}"#.to_string(),
            },
            searches: std::collections::HashMap::new(),
            uploads: std::sync::Mutex::new(std::collections::VecDeque::new()),
            bulk: ApiResponse {
                status: 204,
                body: String::new(),
            },
            uploaded: std::sync::Mutex::new(Vec::new()),
            assigned: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Queues an upload response.
    pub fn push_upload(&self, status: u16, body: &str) {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push_back(ApiResponse {
                status,
                body: body.to_string(),
            });
        }
    }
}

#[cfg(test)]
impl ChannelApi for MockChannelApi {
    fn list_channel_drivers(&self, _channel_id: &str) -> Result<ApiResponse> {
        Ok(self.listing.clone())
    }

    fn search_driver(&self, driver: &DriverVersion) -> Result<ApiResponse> {
        Ok(self
            .searches
            .get(&driver.driver_id)
            .cloned()
            .unwrap_or(ApiResponse {
                status: 404,
                body: String::new(),
            }))
    }

    fn upload_package(&self, archive: &[u8]) -> Result<ApiResponse> {
        if let Ok(mut uploaded) = self.uploaded.lock() {
            uploaded.push(archive.len());
        }
        Ok(self
            .uploads
            .lock()
            .ok()
            .and_then(|mut uploads| uploads.pop_front())
            .unwrap_or(ApiResponse {
                status: 500,
                body: "no scripted response".to_string(),
            }))
    }

    fn bulk_update(&self, _channel_id: &str, drivers: &[DriverVersion]) -> Result<ApiResponse> {
        if let Ok(mut assigned) = self.assigned.lock() {
            assigned.extend_from_slice(drivers);
        }
        Ok(self.bulk.clone())
    }
}
