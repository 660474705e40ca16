//! `reqwest` implementation of the commerce backend contract.
//!
//! The client keeps a cookie store enabled because the backend resolves the
//! guest scope from its own session cookie when no user ID is sent. Reads
//! carry a `_t` cache-busting timestamp; forced reads additionally send
//! `force=true` and no-cache headers.

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tracing::{instrument, warn};

use pasar_core::{CartEntryId, CatalogId, GuestId, Price, SizeId};

use crate::config::ClientConfig;
use crate::models::CartLine;

use super::types::{
    AddToCartRequest, CartItemWire, CountResponse, GuestSessionResponse, MergeRequest,
    MutationResponse, ProfileResponse, UpdateCartRequest, parse_total,
};
use super::{ApiError, CartScope, CommerceBackend};

/// HTTP client for the commerce backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

#[derive(Debug)]
struct HttpBackendInner {
    client: reqwest::Client,
    /// Base URL without a trailing slash.
    base: String,
}

impl HttpBackend {
    /// Create a backend client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout)
            .build()?;
        let base = config.api_url.as_str().trim_end_matches('/').to_owned();
        Ok(Self {
            inner: Arc::new(HttpBackendInner { client, base }),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.inner.base)
    }

    /// Build the scoped read query: cache-bust timestamp, optional user ID,
    /// and the force flag.
    fn read_query(scope: CartScope, force: bool) -> Vec<(&'static str, String)> {
        let mut query = vec![("_t", Utc::now().timestamp_millis().to_string())];
        if let Some(user_id) = scope.user_id {
            query.push(("userId", user_id.to_string()));
        }
        if force {
            query.push(("force", "true".to_owned()));
        }
        query
    }

    async fn get_value(
        &self,
        path: &str,
        scope: CartScope,
        force: bool,
    ) -> Result<serde_json::Value, ApiError> {
        let mut request = self
            .inner
            .client
            .get(self.url(path))
            .query(&Self::read_query(scope, force));
        if force {
            request = request
                .header(CACHE_CONTROL, "no-cache, no-store")
                .header(PRAGMA, "no-cache");
        }
        let response = request.send().await?;
        Self::parse_body(response).await
    }

    /// Read the response body, discriminating auth, status, and parse
    /// failures.
    async fn parse_body(response: reqwest::Response) -> Result<serde_json::Value, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            // Surface the payload message when the backend sent one
            let message = serde_json::from_str::<MutationResponse>(&text)
                .ok()
                .and_then(|e| e.message);
            warn!(status = %status, "backend returned non-success status");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(ApiError::Parse)
    }

    /// Check the `{success, message}` envelope on a mutation response.
    async fn expect_envelope(response: reqwest::Response) -> Result<(), ApiError> {
        let value = Self::parse_body(response).await?;
        let envelope: MutationResponse = serde_json::from_value(value)?;
        if envelope.success {
            Ok(())
        } else {
            Err(ApiError::Business {
                message: envelope.message,
            })
        }
    }
}

impl CommerceBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn guest_session(&self) -> Result<GuestId, ApiError> {
        let value = self
            .get_value("/cart/guest-session", CartScope::guest(), false)
            .await?;
        let response: GuestSessionResponse = serde_json::from_value(value)?;
        response
            .guest_id
            .map(GuestId::new)
            .ok_or(ApiError::MissingField("guestId"))
    }

    #[instrument(skip(self))]
    async fn cart_items(
        &self,
        scope: CartScope,
        force: bool,
    ) -> Result<Vec<CartItemWire>, ApiError> {
        let value = self.get_value("/cart/findMany", scope, force).await?;
        if value.is_array() {
            Ok(serde_json::from_value(value)?)
        } else {
            warn!("cart items payload was not an array, treating as empty");
            Ok(Vec::new())
        }
    }

    #[instrument(skip(self))]
    async fn cart_count(&self, scope: CartScope, force: bool) -> Result<u32, ApiError> {
        let value = self.get_value("/cart/count", scope, force).await?;
        Ok(serde_json::from_value::<CountResponse>(value).map_or(0, |r| r.count))
    }

    #[instrument(skip(self))]
    async fn cart_total(&self, scope: CartScope, force: bool) -> Result<Price, ApiError> {
        let value = self.get_value("/cart/total", scope, force).await?;
        Ok(parse_total(&value))
    }

    #[instrument(skip(self))]
    async fn add_to_cart(
        &self,
        scope: CartScope,
        catalog: CatalogId,
        size: SizeId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/cart/add"))
            .json(&AddToCartRequest {
                user_id: scope.user_id,
                catalog_id: catalog,
                size_id: size,
                quantity,
            })
            .send()
            .await?;
        Self::expect_envelope(response).await
    }

    #[instrument(skip(self))]
    async fn update_cart_entry(
        &self,
        scope: CartScope,
        entry: CartEntryId,
        quantity: u32,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .put(self.url(&format!("/cart/{entry}")))
            .json(&UpdateCartRequest {
                quantity,
                user_id: scope.user_id,
            })
            .send()
            .await?;
        Self::expect_envelope(response).await
    }

    #[instrument(skip(self))]
    async fn remove_cart_entry(
        &self,
        scope: CartScope,
        entry: CartEntryId,
    ) -> Result<(), ApiError> {
        let mut request = self.inner.client.delete(self.url(&format!("/cart/{entry}")));
        if let Some(user_id) = scope.user_id {
            request = request.query(&[("userId", user_id.to_string())]);
        }
        let response = request.send().await?;
        Self::expect_envelope(response).await
    }

    #[instrument(skip(self, token, lines), fields(line_count = lines.len()))]
    async fn merge_guest_cart(
        &self,
        token: &str,
        lines: &[CartLine],
        guest_id: &GuestId,
    ) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/cart/sync"))
            .bearer_auth(token)
            .json(&MergeRequest {
                cart: lines,
                guest_id,
                confirm_merge: true,
            })
            .send()
            .await?;
        Self::expect_envelope(response).await
    }

    #[instrument(skip(self))]
    async fn clear_guest_cart(&self) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .delete(self.url("/cart/clear-guest-cart"))
            .send()
            .await?;
        // No envelope contract on this endpoint; a 2xx is success
        Self::parse_body(response).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), ApiError> {
        let response = self
            .inner
            .client
            .post(self.url("/auth/logout"))
            .send()
            .await?;
        Self::parse_body(response).await.map(|_| ())
    }

    #[instrument(skip(self, token))]
    async fn fetch_profile(&self, token: &str) -> Result<ProfileResponse, ApiError> {
        let response = self
            .inner
            .client
            .get(self.url("/auth/profile"))
            .bearer_auth(token)
            .send()
            .await?;
        let value = Self::parse_body(response).await?;
        Ok(serde_json::from_value(value)?)
    }
}
