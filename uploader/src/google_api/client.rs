//! Authenticated access to Google APIs.

use crate::config::Endpoints;
use crate::credentials::TokenCache;
use crate::oauth::OAuthManager;
use eyre::Context;
use http::Method;
use oauth2::TokenResponse;
use oauth2::basic::BasicTokenResponse;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use tracing::instrument;

/// How long before its recorded expiry an access token is already considered stale.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// An OAuth token together with the moment its access token stops working.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    token: BasicTokenResponse,
    /// `None` if the provider never said, in which case the token is used until it fails.
    expires_at: Option<SystemTime>,
}

impl TimeBoundAccessToken {
    /// Wraps a token that was just issued, deriving its expiry from `expires_in`.
    pub fn new(token: BasicTokenResponse) -> Self {
        Self {
            expires_at: token.expires_in().map(|d| SystemTime::now() + d),
            token,
        }
    }

    /// Wraps a token whose expiry is already known, such as one loaded from the cache.
    pub fn with_expiry(token: BasicTokenResponse, expires_at: Option<SystemTime>) -> Self {
        Self { token, expires_at }
    }

    /// The token as issued by the provider.
    pub fn raw_token(&self) -> &BasicTokenResponse {
        &self.token
    }

    /// When the access token stops working, if known.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.expires_at
    }

    /// Whether the access token should be refreshed before being used at `now`.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        match self.expires_at {
            Some(expires_at) => now + EXPIRY_BUFFER >= expires_at,
            None => false,
        }
    }

    /// Refreshes this token using the provided OAuth manager, preserving the refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - Refresh failed (invalid grant, no refresh token, etc.)
    /// * `Err(_)` - Network or other error occurred
    pub async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        match oauth_manager
            .refresh_token(&self.token)
            .await
            .context("refresh OAuth token")?
        {
            Some(new_token) => {
                let old_token = std::mem::replace(&mut self.token, new_token);

                // Google does not hand out a new refresh token on refresh.
                if self.token.refresh_token().is_none() {
                    tracing::trace!("new token lacks refresh token, preserving original");
                    self.token
                        .set_refresh_token(old_token.refresh_token().cloned());
                }

                self.expires_at = self.token.expires_in().map(|d| SystemTime::now() + d);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Client for the Google APIs the uploader uses.
///
/// Every request carries the user's access token. The token is refreshed shortly before it
/// expires, and a refreshed token is written back to the token cache so the next run starts
/// from it.
#[derive(Debug, Clone)]
pub struct GoogleClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    oauth_manager: Arc<OAuthManager>,
    cache: Arc<TokenCache>,
    endpoints: Arc<Endpoints>,
    client: reqwest::Client,
}

impl GoogleClient {
    /// Creates a client from an already-obtained token.
    ///
    /// # Arguments
    ///
    /// * `token` - The user's current token
    /// * `oauth_manager` - Used to refresh `token` once it goes stale
    /// * `cache` - Where refreshed tokens are written
    /// * `endpoints` - Base URLs of the APIs
    /// * `client` - The HTTP client for API requests
    pub fn new(
        token: TimeBoundAccessToken,
        oauth_manager: OAuthManager,
        cache: TokenCache,
        endpoints: Endpoints,
        client: reqwest::Client,
    ) -> Self {
        Self {
            token: Arc::new(Mutex::new(token)),
            oauth_manager: Arc::new(oauth_manager),
            cache: Arc::new(cache),
            endpoints: Arc::new(endpoints),
            client,
        }
    }

    /// Returns a clone of the underlying OAuth2 token.
    pub async fn token(&self) -> TimeBoundAccessToken {
        self.token.lock().await.clone()
    }

    pub(crate) fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Gets a usable access token, refreshing (and re-caching) it first if it is stale.
    #[instrument(skip(self))]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if token.is_stale(SystemTime::now()) {
            tracing::debug!("access token expired, attempting refresh");

            if !token.refresh(&self.oauth_manager).await? {
                tracing::error!("access token refresh failed, client is unusable");
                eyre::bail!(
                    "unable to refresh expired access token; delete {} to authorize again",
                    self.cache.path().display()
                );
            }
            tracing::debug!("access token successfully refreshed");

            self.cache
                .save(&token)
                .await
                .context("cache refreshed OAuth token")?;
        }

        Ok(token.raw_token().access_token().secret().to_string())
    }

    /// Sends an authenticated request and fails on any non-success status.
    ///
    /// `customize` gets the request with the `Authorization` header already set and may add
    /// query parameters, headers, or a body.
    #[instrument(skip(self, customize), level = tracing::Level::TRACE)]
    pub(crate) async fn send_authenticated(
        &self,
        method: Method,
        url: &str,
        customize: impl FnOnce(reqwest::RequestBuilder) -> reqwest::RequestBuilder,
    ) -> eyre::Result<reqwest::Response> {
        let access_token = self.fresh_access_token().await?;

        let request = self
            .client
            .request(method.clone(), url)
            .header("Authorization", format!("Bearer {}", access_token));

        let response = customize(request)
            .send()
            .await
            .with_context(|| format!("send {} request to {}", method, url))?;

        let status_code = response.status();
        if !status_code.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(eyre::eyre!(
                "{} {} failed with status {}: {}",
                method,
                url,
                status_code,
                error_text
            ));
        }

        Ok(response)
    }

    /// Makes an authenticated request with optional query parameters and JSON body.
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        url: &str,
        query_params: Option<&[(&str, &str)]>,
        json_body: Option<&impl Serialize>,
    ) -> eyre::Result<reqwest::Response> {
        self.send_authenticated(method, url, |mut request| {
            if let Some(params) = query_params {
                request = request.query(params);
            }
            if let Some(body) = json_body {
                request = request.json(body);
            }
            request
        })
        .await
    }
}
