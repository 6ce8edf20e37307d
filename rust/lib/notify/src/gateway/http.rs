use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::NotificationGateway;
use crate::error::GatewayError;
use crate::model::Page;
use crate::wire::{WirePage, WireUnreadCount};

// ====================================================================
// TokenSource
// ====================================================================

/// Pluggable bearer token provider, called before every request.
///
/// Returns `Ok(None)` to send the request without an Authorization
/// header.
#[async_trait::async_trait]
pub trait TokenSource: Send + Sync + 'static {
    async fn token(&self) -> Result<Option<String>, GatewayError>;
}

/// Anonymous requests.
pub struct NoAuth;

#[async_trait::async_trait]
impl TokenSource for NoAuth {
    async fn token(&self) -> Result<Option<String>, GatewayError> {
        Ok(None)
    }
}

/// Bearer token obtained elsewhere (login is outside this crate).
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<Option<String>, GatewayError> {
        if self.0.trim().is_empty() {
            return Err(GatewayError::Auth("empty token".into()));
        }
        Ok(Some(self.0.clone()))
    }
}

// ====================================================================
// HttpGateway
// ====================================================================

/// Gateway over the REST notification API:
///
/// - `GET  {base}/notifications/unread-count`
/// - `GET  {base}/notifications?page={n}&size={s}`
/// - `POST {base}/notifications/{id}/click`
/// - `POST {base}/notifications/mark-all-read`
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
    token_source: Arc<dyn TokenSource>,
}

impl HttpGateway {
    pub fn new(
        base_url: impl Into<String>,
        token_source: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| GatewayError::InvalidUrl(format!("{}: {}", raw, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(format!("{}: not a base url", raw)));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            token_source,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// `{base}/notifications/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("notifications").extend(segments);
        }
        url
    }

    fn click_url(&self, id: &str) -> Url {
        self.url(&[id, "click"])
    }

    /// Build a request with auth header.
    async fn authed(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, GatewayError> {
        match self.token_source.token().await? {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Ok(builder),
        }
    }

    /// Map non-2xx statuses to `GatewayError::Server`.
    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let code = status.as_u16();
        let body = resp.text().await.unwrap_or_default();
        if code == 401 || code == 403 {
            return Err(GatewayError::Auth(format!("HTTP {}: {}", code, body)));
        }
        Err(GatewayError::Server { status: code, message: body })
    }

    async fn parse<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, GatewayError> {
        let resp = Self::check(resp).await?;
        resp.json::<R>()
            .await
            .map_err(|e| GatewayError::Decode(format!("response body: {}", e)))
    }

    async fn ack(&self, url: Url) -> Result<(), GatewayError> {
        let req = self.authed(self.http.post(url)).await?;
        let resp = req.send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl NotificationGateway for HttpGateway {
    async fn fetch_unread_count(&self) -> Result<u32, GatewayError> {
        let req = self.authed(self.http.get(self.url(&["unread-count"]))).await?;
        let resp = req.send().await?;
        let body: WireUnreadCount = Self::parse(resp).await?;
        Ok(body.clamped())
    }

    async fn fetch_page(&self, page: u32, size: u32) -> Result<Page, GatewayError> {
        let req = self
            .http
            .get(self.url(&[]))
            .query(&[("page", page), ("size", size)]);
        let req = self.authed(req).await?;
        let resp = req.send().await?;
        let body: WirePage = Self::parse(resp).await?;
        let page = Page::from(body);
        debug!("fetched page {} ({} items, last={})", page.number, page.items.len(), page.is_last);
        Ok(page)
    }

    async fn mark_read(&self, id: &str) -> Result<(), GatewayError> {
        self.ack(self.click_url(id)).await
    }

    async fn mark_all_read(&self) -> Result<(), GatewayError> {
        self.ack(self.url(&["mark-all-read"])).await
    }
}
