use std::time::Duration;

use reqwest::{Client, Url};

use xemphim_core::config::ApiConfig;
use xemphim_core::models::{CatalogPage, CategorySummary, EpisodeRecord, NotificationPage};
use xemphim_core::notifications::UnreadCountSource;
use xemphim_core::storage::{KeyValueStore, DEVICE_TOKEN_KEY};

use crate::error::ApiError;
use crate::types::{Envelope, LatestResponse, UnreadCountResponse};

const DEVICE_TOKEN_HEADER: &str = "x-device-token";

/// Client for the catalog backend.
///
/// Notification endpoints identify the install by the push token kept in
/// local storage; `tokens` is where that token is read from.
#[derive(Clone)]
pub struct BackendClient<S> {
    base: Url,
    http: Client,
    tokens: S,
}

impl<S: KeyValueStore> BackendClient<S> {
    pub fn new(config: &ApiConfig, tokens: S) -> Result<Self, ApiError> {
        let base = Url::parse(&config.base_url)?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { base, http, tokens })
    }

    /// The stored device token. Storage failures read as "no token".
    pub async fn device_token(&self) -> Option<String> {
        match self.tokens.get(DEVICE_TOKEN_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Error getting device token: {e}");
                None
            }
        }
    }

    /// Check the HTTP response for errors and return the body text on failure.
    async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status, "Backend API error");
            Err(ApiError::Api {
                status,
                message: body,
            })
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Parse(format!("base URL cannot have a path: {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Unread notifications for this device. No device token means zero.
    pub async fn get_unread_count(&self) -> Result<u32, ApiError> {
        let Some(token) = self.device_token().await else {
            return Ok(0);
        };

        let resp = self
            .http
            .get(self.endpoint(&["notifications", "device", "unread-count"])?)
            .header(DEVICE_TOKEN_HEADER, token)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let status = resp.status().as_u16();
        let body: UnreadCountResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        body.into_count(status)
    }

    /// Mark one notification as read. Returns whether a request was sent;
    /// without a device token this is a no-op.
    pub async fn mark_as_read(&self, notification_id: &str) -> Result<bool, ApiError> {
        let Some(token) = self.device_token().await else {
            tracing::debug!("No device token, skipping mark-as-read");
            return Ok(false);
        };

        let resp = self
            .http
            .put(self.endpoint(&["notifications", notification_id, "read"])?)
            .header(DEVICE_TOKEN_HEADER, token)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        Self::check_response(resp).await?;
        Ok(true)
    }

    /// One page of this device's notification history.
    pub async fn notifications(&self, page: u32, limit: u32) -> Result<NotificationPage, ApiError> {
        let token = self
            .device_token()
            .await
            .ok_or(ApiError::MissingDeviceToken)?;

        let resp = self
            .http
            .get(self.endpoint(&["notifications", "device", "history"])?)
            .header(DEVICE_TOKEN_HEADER, token)
            .query(&[("page", page.max(1)), ("limit", limit)])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        resp.json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// Episode record by slug.
    pub async fn episode(&self, slug: &str) -> Result<EpisodeRecord, ApiError> {
        let resp = self
            .http
            .get(self.endpoint(&["product", slug])?)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let body: Envelope<EpisodeRecord> = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.data)
    }

    /// Recently updated series.
    pub async fn latest(&self) -> Result<CatalogPage, ApiError> {
        let resp = self
            .http
            .get(self.endpoint(&["category", "latest", "next"])?)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let body: LatestResponse = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.into())
    }

    /// Series whose name matches `query`.
    pub async fn search(&self, query: &str) -> Result<Vec<CategorySummary>, ApiError> {
        let resp = self
            .http
            .get(self.endpoint(&["categorys", "search"])?)
            .query(&[("value", query)])
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let body: Envelope<Vec<CategorySummary>> = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.data)
    }

    /// Series detail by slug, including its episode list.
    pub async fn category(&self, slug: &str) -> Result<CategorySummary, ApiError> {
        let resp = self
            .http
            .get(self.endpoint(&["category", slug])?)
            .send()
            .await?;

        let resp = Self::check_response(resp).await?;
        let body: Envelope<CategorySummary> = resp
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(body.data)
    }
}

impl<S: KeyValueStore> UnreadCountSource for BackendClient<S> {
    type Error = ApiError;

    async fn unread_count(&self) -> Result<u32, ApiError> {
        self.get_unread_count().await
    }
}
