//! WooCommerce API connector implementation
//!
//! Implements the `RemoteCatalog` trait for the WooCommerce REST API v3.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bridge_traits::catalog::{CreateRequest, EntityKind, RemoteCatalog, RemoteEntity};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, WooCommerceError};
use crate::payload::build_create_body;
use crate::types::{WooEntity, WooErrorBody};

/// REST namespace appended to the site URL
const API_PREFIX: &str = "wp-json/wc/v3";

/// Maximum results per page accepted by WooCommerce
const MAX_PAGE_SIZE: u32 = 100;

/// Safety ceiling for paginated listings
const DEFAULT_MAX_PAGES: u32 = 100;

/// Page count WordPress reports on collection responses
const TOTAL_PAGES_HEADER: &str = "X-WP-TotalPages";

/// Longest error body excerpt kept when the response is not JSON
const ERROR_EXCERPT_LEN: usize = 200;

/// Connection settings for one WooCommerce site
#[derive(Clone)]
pub struct WooCommerceConfig {
    /// Site root, e.g. `https://shop.example`
    pub base_url: String,
    /// Precomputed `Authorization` header value
    pub authorization: String,
    pub per_page: u32,
    pub max_pages: u32,
    pub request_timeout: Duration,
}

impl WooCommerceConfig {
    /// Configure a site using REST API consumer key and secret (HTTP Basic)
    pub fn new(
        base_url: impl Into<String>,
        consumer_key: impl AsRef<str>,
        consumer_secret: impl AsRef<str>,
    ) -> Self {
        let credentials = format!("{}:{}", consumer_key.as_ref(), consumer_secret.as_ref());
        Self::with_authorization(base_url, format!("Basic {}", BASE64.encode(credentials)))
    }

    /// Configure a site with an opaque `Authorization` header value
    pub fn with_authorization(base_url: impl Into<String>, authorization: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authorization: authorization.into(),
            per_page: MAX_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for WooCommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooCommerceConfig")
            .field("base_url", &self.base_url)
            .field("authorization", &"<redacted>")
            .field("per_page", &self.per_page)
            .field("max_pages", &self.max_pages)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// WooCommerce REST API connector
///
/// # Example
///
/// ```ignore
/// use provider_woocommerce::{WooCommerceConfig, WooCommerceConnector};
/// use bridge_traits::catalog::{EntityKind, RemoteCatalog};
///
/// let config = WooCommerceConfig::new("https://shop.example", "ck_...", "cs_...");
/// let connector = WooCommerceConnector::new(http_client, config);
/// let categories = connector.list_entities(EntityKind::Category).await?;
/// ```
pub struct WooCommerceConnector {
    http_client: Arc<dyn HttpClient>,
    config: WooCommerceConfig,
}

impl WooCommerceConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, config: WooCommerceConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }

    fn endpoint(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Category => "products/categories",
            EntityKind::Product => "products",
        }
    }

    fn url(&self, kind: EntityKind) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url,
            API_PREFIX,
            Self::endpoint(kind)
        )
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .authorization(self.config.authorization.clone())
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout)
    }

    /// Fetch one page of a listing, with the `X-WP-TotalPages` hint when sent.
    async fn fetch_page(
        &self,
        kind: EntityKind,
        page: u32,
    ) -> Result<(Vec<WooEntity>, Option<u32>)> {
        let request = self
            .request(HttpMethod::Get, self.url(kind))
            .query("per_page", self.config.per_page)
            .query("page", page);

        let response = self.http_client.execute(request).await?;
        if response.status != 200 {
            return Err(Self::map_error(kind, &response));
        }

        let total_pages = response
            .header(TOTAL_PAGES_HEADER)
            .and_then(|value| value.trim().parse().ok());
        let entities = response
            .json::<Vec<WooEntity>>()
            .map_err(|e| WooCommerceError::ParseError(e.to_string()))?;
        Ok((entities, total_pages))
    }

    /// Fetch every page until an empty or short page, the last page the
    /// server announced, or the page ceiling.
    async fn fetch_all(&self, kind: EntityKind) -> Result<Vec<RemoteEntity>> {
        let mut entities = Vec::new();

        for page in 1..=self.config.max_pages {
            let (batch, total_pages) = self.fetch_page(kind, page).await?;
            let count = batch.len();
            debug!(kind = %kind, page, count, ?total_pages, "Fetched page");

            entities.extend(batch.into_iter().map(RemoteEntity::from));

            let last_announced = total_pages.is_some_and(|total| page >= total);
            if count < self.config.per_page as usize || last_announced {
                return Ok(entities);
            }
        }

        warn!(
            kind = %kind,
            max_pages = self.config.max_pages,
            "Stopped listing at page ceiling"
        );
        Ok(entities)
    }

    async fn create(&self, kind: EntityKind, request: &CreateRequest) -> Result<RemoteEntity> {
        let body = build_create_body(kind, request)?;
        let http_request = self.request(HttpMethod::Post, self.url(kind)).json(&body)?;

        let response = self.http_client.execute(http_request).await?;
        if response.status != 201 {
            let error = Self::map_error(kind, &response);
            warn!(kind = %kind, name = %request.name, error = %error, "Create rejected");
            return Err(error);
        }

        let entity: WooEntity = response
            .json()
            .map_err(|e| WooCommerceError::ParseError(e.to_string()))?;
        info!(kind = %kind, id = entity.id, name = %entity.name, "Created remote entity");
        Ok(entity.into())
    }

    /// Map a non-success response to a provider error.
    fn map_error(kind: EntityKind, response: &HttpResponse) -> WooCommerceError {
        let status = response.status;
        let parsed: Option<WooErrorBody> = response.json().ok();
        let message = Self::error_message(status, parsed.as_ref(), response);
        let code = parsed.as_ref().and_then(|b| b.code.as_deref());
        let entity = kind.to_string();

        let lowered = message.to_lowercase();
        let duplicate = code == Some("term_exists")
            || (status == 500
                && (lowered.contains("duplicate") || lowered.contains("already exists")));

        if duplicate {
            return WooCommerceError::Duplicate { entity, message };
        }

        match status {
            400 => WooCommerceError::InvalidData { entity, message },
            401 | 403 => WooCommerceError::PermissionDenied { status, message },
            _ => WooCommerceError::ApiError {
                status_code: status,
                message,
            },
        }
    }

    fn error_message(status: u16, body: Option<&WooErrorBody>, response: &HttpResponse) -> String {
        if let Some(body) = body {
            if let Some(message) = body.message.as_deref() {
                let params = body.data.as_ref().and_then(|d| d.params.as_ref());
                return match params {
                    Some(params) => format!("{} - Invalid params: {}", message, params),
                    None => message.to_string(),
                };
            }
        }

        match response.text() {
            Ok(text) if !text.trim().is_empty() => text.chars().take(ERROR_EXCERPT_LEN).collect(),
            _ => format!("HTTP {}", status),
        }
    }
}

#[async_trait]
impl RemoteCatalog for WooCommerceConnector {
    #[instrument(skip(self), fields(base_url = %self.config.base_url))]
    async fn list_entities(
        &self,
        kind: EntityKind,
    ) -> bridge_traits::error::Result<Vec<RemoteEntity>> {
        info!(kind = %kind, "Listing remote entities");
        let entities = self.fetch_all(kind).await?;
        info!(kind = %kind, count = entities.len(), "Listed remote entities");
        Ok(entities)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    async fn create_entity(
        &self,
        kind: EntityKind,
        request: CreateRequest,
    ) -> bridge_traits::error::Result<RemoteEntity> {
        Ok(self.create(kind, &request).await?)
    }
}
