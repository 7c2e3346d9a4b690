// # Google Cloud DNS Provider
//
// This crate provides the Cloud DNS zone reader/writer for the buddy reconciler.
//
// ## Behavior
//
// - One HTTP request per API page or submitted change
// - Pagination is followed sequentially (`pageToken` chaining)
// - Errors are propagated to the reconciler; there is no retry, backoff or
//   caching here, the next cycle simply re-reads the zones
// - A change the API rejects as `alreadyExists` is reported as
//   `Error::AlreadyExists` so the reconciler can log it and continue
//
// ## Security Requirements
//
// - Access token NEVER appears in logs
// - Provider MUST fail fast if token is empty
//
// ## API Reference
//
// - Cloud DNS v1: https://cloud.google.com/dns/docs/reference/v1
// - List managed zones: GET `/projects/:project/managedZones`
// - List record sets: GET `/projects/:project/managedZones/:zone/rrsets`
// - Create change: POST `/projects/:project/managedZones/:zone/changes`

use async_trait::async_trait;
use buddy_core::config::ProviderConfig;
use buddy_core::model::ResourceRecord;
use buddy_core::traits::{ZoneProvider, ZoneProviderFactory, ZoneReader, ZoneWriter};
use buddy_core::{Error, Result};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Cloud DNS API base URL
pub const CLOUD_DNS_API_BASE: &str = "https://dns.googleapis.com/dns/v1";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "clouddns";

/// Google Cloud DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless, and single-shot. All coordination
/// (what to change, when to retry) is owned by the `Reconciler`.
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the access token.
pub struct CloudDnsProvider {
    /// Project owning the managed zones
    project: String,

    /// OAuth2 bearer token
    /// ⚠️ NEVER log this value
    access_token: String,

    /// API base URL (overridable for emulators and tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the access token
impl std::fmt::Debug for CloudDnsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudDnsProvider")
            .field("project", &self.project)
            .field("access_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZone {
    name: String,
    dns_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedZonesPage {
    #[serde(default)]
    managed_zones: Vec<ManagedZone>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordSetsPage {
    #[serde(default)]
    rrsets: Vec<ResourceRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChangeRequest<'a> {
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    additions: &'a [ResourceRecord],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    deletions: &'a [ResourceRecord],
}

/// Google API error envelope
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: ApiError,
}

#[derive(Debug, Default, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    reason: String,
}

impl ApiErrorBody {
    fn parse(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_default()
    }

    fn has_reason(&self, reason: &str) -> bool {
        self.error.errors.iter().any(|item| item.reason == reason)
    }
}

impl CloudDnsProvider {
    /// Create a new Cloud DNS provider
    ///
    /// # Parameters
    ///
    /// - `project`: Project owning the managed zones
    /// - `access_token`: OAuth2 token with the `ndev.clouddns.readwrite` scope
    ///
    /// # Security
    ///
    /// The access token will NEVER be logged or displayed in error messages.
    pub fn new(project: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        let project = project.into();
        let access_token = access_token.into();

        if project.is_empty() {
            return Err(Error::config("Cloud DNS project cannot be empty"));
        }
        if access_token.is_empty() {
            return Err(Error::config("Cloud DNS access token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            project,
            access_token,
            base_url: CLOUD_DNS_API_BASE.to_string(),
            client,
        })
    }

    /// Point the provider at another API root (emulator, mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn zones_url(&self) -> String {
        format!("{}/projects/{}/managedZones", self.base_url, self.project)
    }

    fn zone_url(&self, dns_zone: &str, collection: &str) -> String {
        format!("{}/{}/{}", self.zones_url(), dns_zone, collection)
    }

    /// GET one page of a collection
    async fn get_page<T: DeserializeOwned>(
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
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

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
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("Failed to parse response: {}", e)))
    }
}

/// Map a non-success HTTP status to an error
fn status_error(status: StatusCode, error_text: &str, context: &str) -> Error {
    let body = ApiErrorBody::parse(error_text);
    let detail = if body.error.message.is_empty() {
        error_text.to_string()
    } else {
        body.error.message
    };

    match status.as_u16() {
        401 | 403 => Error::provider(
            PROVIDER_NAME,
            format!(
                "{}: authentication failed, invalid access token or insufficient permissions. Status: {}",
                context, status
            ),
        ),
        404 => Error::provider(PROVIDER_NAME, format!("{}: not found: {}", context, detail)),
        429 => Error::provider(
            PROVIDER_NAME,
            format!("{}: rate limit exceeded. Status: {}", context, status),
        ),
        500..=599 => Error::provider(
            PROVIDER_NAME,
            format!("{}: Cloud DNS server error (transient): {} - {}", context, status, detail),
        ),
        _ => Error::provider(
            PROVIDER_NAME,
            format!("{}: {} - {}", context, status, detail),
        ),
    }
}

#[async_trait]
impl ZoneReader for CloudDnsProvider {
    async fn managed_zones(&self) -> Result<HashMap<String, String>> {
        let url = self.zones_url();
        let mut zones = HashMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ManagedZonesPage = self
                .get_page(&url, page_token.as_deref(), "list managed zones")
                .await?;
            for zone in page.managed_zones {
                zones.insert(zone.name, zone.dns_name);
            }
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        tracing::debug!("Project {} has {} managed zones", self.project, zones.len());
        Ok(zones)
    }

    async fn record_sets(&self, dns_zone: &str) -> Result<Vec<ResourceRecord>> {
        let url = self.zone_url(dns_zone, "rrsets");
        let context = format!("list record sets of {}", dns_zone);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: RecordSetsPage = self
                .get_page(&url, page_token.as_deref(), &context)
                .await?;
            records.extend(page.rrsets);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(records)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[async_trait]
impl ZoneWriter for CloudDnsProvider {
    /// Submit one change
    ///
    /// # API Call
    ///
    /// ```http
    /// POST /projects/:project/managedZones/:zone/changes
    /// {
    ///   "additions": [{"name": "a.example.com.", "type": "A", "ttl": 300, "rrdatas": ["10.0.0.1"]}],
    ///   "deletions": []
    /// }
    /// ```
    async fn apply_change(
        &self,
        dns_zone: &str,
        additions: &[ResourceRecord],
        deletions: &[ResourceRecord],
    ) -> Result<()> {
        if additions.is_empty() && deletions.is_empty() {
            tracing::debug!("Didn't submit change to {} (no changes)", dns_zone);
            return Ok(());
        }

        tracing::info!(
            "Submitting change to zone {}: {} addition(s), {} deletion(s)",
            dns_zone,
            additions.len(),
            deletions.len()
        );

        let response = self
            .client
            .post(self.zone_url(dns_zone, "changes"))
            .bearer_auth(&self.access_token)
            .json(&ChangeRequest {
                additions,
                deletions,
            })
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        let body = ApiErrorBody::parse(&error_text);

        if status == StatusCode::CONFLICT || body.has_reason("alreadyExists") {
            let message = if body.error.message.is_empty() {
                error_text
            } else {
                body.error.message
            };
            return Err(Error::already_exists(dns_zone, message));
        }

        Err(status_error(
            status,
            &error_text,
            &format!("create change in {}", dns_zone),
        ))
    }
}

/// Factory for creating Cloud DNS providers
pub struct CloudDnsFactory;

impl ZoneProviderFactory for CloudDnsFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn ZoneProvider>> {
        match config {
            ProviderConfig::CloudDns {
                project,
                access_token,
                endpoint,
            } => {
                let mut provider = CloudDnsProvider::new(project.clone(), access_token.clone())?;
                if let Some(endpoint) = endpoint.as_deref().filter(|e| !e.is_empty()) {
                    tracing::warn!("Cloud DNS API endpoint overridden: {}", endpoint);
                    provider = provider.with_base_url(endpoint);
                }
                Ok(Box::new(provider))
            }
            _ => Err(Error::config("Invalid config for Cloud DNS provider")),
        }
    }
}

/// Register the Cloud DNS provider with a registry
///
/// # Example
///
/// ```rust
/// use buddy_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// buddy_provider_clouddns::register(&registry);
/// assert!(registry.has_provider("clouddns"));
/// ```
pub fn register(registry: &buddy_core::ProviderRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(CloudDnsFactory));
}
