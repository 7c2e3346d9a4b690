// # Compute Engine REST client
//
// Read-only calls against the Compute Engine v1 API: zone and region lookup
// and paginated instance listing.
//
// ## API Reference
//
// - Compute Engine v1: https://cloud.google.com/compute/docs/reference/rest/v1
// - Get zone: GET `/projects/:project/zones/:zone`
// - Get region: GET `/projects/:project/regions/:region`
// - List instances: GET `/projects/:project/zones/:zone/instances`

use crate::instance::{ApiInstance, Instance};
use buddy_core::{Error, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Compute Engine API base URL
pub const COMPUTE_API_BASE: &str = "https://compute.googleapis.com/compute/v1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) const SOURCE_NAME: &str = "gce";

#[derive(Debug, Deserialize)]
struct ApiZone {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ApiRegion {
    #[serde(default)]
    zones: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstancesPage {
    #[serde(default)]
    items: Vec<ApiInstance>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Compute Engine API client for one project
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the access token.
#[derive(Clone)]
pub struct ComputeEngineClient {
    project: String,

    /// OAuth2 bearer token
    /// ⚠️ NEVER log this value
    access_token: String,

    base_url: String,

    client: reqwest::Client,
}

impl std::fmt::Debug for ComputeEngineClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputeEngineClient")
            .field("project", &self.project)
            .field("access_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ComputeEngineClient {
    /// Create a client with the `compute.readonly` access token of a project
    pub fn new(project: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let project = project.into();
        let access_token = access_token.into();

        if project.is_empty() {
            return Err(Error::config("Compute Engine project cannot be empty"));
        }
        if access_token.is_empty() {
            return Err(Error::config("Compute Engine access token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            project,
            access_token,
            base_url: COMPUTE_API_BASE.to_string(),
            client,
        })
    }

    /// Point the client at another API root (emulator, mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Verify a compute zone exists and return its name
    pub async fn zone(&self, zone: &str) -> Result<String> {
        let url = format!("{}/projects/{}/zones/{}", self.base_url, self.project, zone);
        let zone: ApiZone = self
            .get(&url, None, &format!("Unable to retrieve zone {}", zone))
            .await?;
        Ok(zone.name)
    }

    /// Names of all compute zones of a region
    pub async fn region_zones(&self, region: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/projects/{}/regions/{}",
            self.base_url, self.project, region
        );
        let region: ApiRegion = self
            .get(&url, None, &format!("Unable to retrieve region {}", region))
            .await?;

        // Zones are listed as URLs ending in `/zones/<name>`
        let mut zones: Vec<String> = region
            .zones
            .iter()
            .filter_map(|url| url.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        zones.sort();
        Ok(zones)
    }

    /// All publishable instances of a compute zone
    ///
    /// Instances with an unsupported network layout are skipped with a warning.
    pub async fn instances(&self, zone: &str) -> Result<Vec<Instance>> {
        let url = format!(
            "{}/projects/{}/zones/{}/instances",
            self.base_url, self.project, zone
        );
        let context = format!("Unable to retrieve list of instances in {}", zone);
        let mut instances = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: InstancesPage = self.get(&url, page_token.as_deref(), &context).await?;
            for api_instance in page.items {
                match Instance::from_api(api_instance, zone) {
                    Ok(instance) => instances.push(instance),
                    Err(e) => tracing::warn!("{}", e),
                }
            }
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(instances)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        page_token: Option<&str>,
        context: &str,
    ) -> Result<T> {
        let mut request = self.client.get(url).bearer_auth(&self.access_token);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(SOURCE_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        response
            .json()
            .await
            .map_err(|e| Error::provider(SOURCE_NAME, format!("Failed to parse response: {}", e)))
    }
}

fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::provider(
            SOURCE_NAME,
            format!(
                "{}: authentication failed, invalid access token or insufficient permissions. Status: {}",
                context, status
            ),
        ),
        404 => Error::not_found(context.to_string()),
        429 => Error::provider(
            SOURCE_NAME,
            format!("{}: rate limit exceeded. Status: {}", context, status),
        ),
        500..=599 => Error::provider(
            SOURCE_NAME,
            format!(
                "{}: Compute Engine server error (transient): {} - {}",
                context, status, error_text
            ),
        ),
        _ => Error::provider(
            SOURCE_NAME,
            format!("{}: {} - {}", context, status, error_text),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_not_exposed_in_debug() {
        let client = ComputeEngineClient::new("my-project", "secret_token_12345").unwrap();
        let debug_str = format!("{:?}", client);
        assert!(!debug_str.contains("secret_token"));
    }

    #[test]
    fn test_empty_token_is_a_config_error() {
        assert!(
            ComputeEngineClient::new("my-project", "")
                .unwrap_err()
                .is_config()
        );
    }

    #[test]
    fn not_found_keeps_context() {
        let err = status_error(StatusCode::NOT_FOUND, "", "Unable to retrieve zone x");
        assert!(matches!(err, Error::NotFound(ref m) if m.contains("zone x")));
    }
}
