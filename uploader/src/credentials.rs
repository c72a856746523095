//! Getting hold of an authorized client.
//!
//! The user's token is cached on disk after the first authorization. Later runs construct the
//! client straight from the cache and only go back to the user if the cache is missing or
//! cannot be read.

use crate::config::Config;
use crate::google_api::client::{GoogleClient, TimeBoundAccessToken};
use crate::oauth::{AuthorizationCodeSource, ClientSecrets, OAuthManager};
use eyre::Context;
use jiff::Timestamp;
use oauth2::basic::BasicTokenResponse;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::io::AsyncWriteExt;

/// On-disk form of a [`TimeBoundAccessToken`].
#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    token: BasicTokenResponse,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
}

/// The file holding the user's access and refresh tokens between runs.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    /// A cache kept in the file at `path`. Nothing is read or written until asked.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The location of the cache file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cached token.
    ///
    /// # Errors
    ///
    /// Fails if the file is missing, unreadable, or does not hold a cached token. Callers
    /// treat all of these as "no token cached".
    pub async fn load(&self) -> eyre::Result<TimeBoundAccessToken> {
        let json = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("read {}", self.path.display()))?;
        let cached: CachedToken = serde_json::from_slice(&json)
            .with_context(|| format!("parse cached token in {}", self.path.display()))?;
        Ok(TimeBoundAccessToken::with_expiry(
            cached.token,
            cached.expires_at.map(SystemTime::from),
        ))
    }

    /// Replaces the cache with the given token.
    ///
    /// The file is only readable and writable by its owner.
    pub async fn save(&self, token: &TimeBoundAccessToken) -> eyre::Result<()> {
        let cached = CachedToken {
            token: token.raw_token().clone(),
            expires_at: token
                .expires_at()
                .map(Timestamp::try_from)
                .transpose()
                .context("convert token expiry")?,
        };
        let json = serde_json::to_vec_pretty(&cached).context("serialize OAuth token")?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create {}", dir.display()))?;
        }

        tracing::info!(path = %self.path.display(), "saving OAuth token");
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);
        let mut file = options
            .open(&self.path)
            .await
            .with_context(|| format!("open {}", self.path.display()))?;
        // `mode` only applies to newly created files.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .context("restrict token cache permissions")?;
        }
        file.write_all(&json).await.context("write OAuth token")?;
        file.flush().await.context("flush OAuth token")?;
        Ok(())
    }
}

/// Produces a client authorized with the scopes in `config`.
///
/// The OAuth client descriptor must be readable even when a cached token exists, since it is
/// needed to refresh that token. If no usable token is cached, the user is taken through
/// authorization with the code coming from `code_source`, and the resulting token is cached.
///
/// # Arguments
///
/// * `config` - Supplies the descriptor path, token cache path, scopes, and API endpoints
/// * `code_source` - Only consulted when no usable token is cached
///
/// # Errors
///
/// Fails before any network activity if the client descriptor cannot be read. Also fails if
/// authorization is rejected or the new token cannot be cached.
pub async fn obtain_client(
    config: &Config,
    code_source: &AuthorizationCodeSource,
) -> eyre::Result<GoogleClient> {
    let secrets = ClientSecrets::from_file(&config.credentials_path).await?;
    let oauth_manager = OAuthManager::new(secrets, config.scopes.clone());
    let cache = TokenCache::new(config.token_cache_path.clone());

    let token = match cache.load().await {
        Ok(token) => {
            tracing::debug!(path = %cache.path().display(), "using cached OAuth token");
            token
        }
        Err(e) => {
            tracing::info!("no usable cached OAuth token ({e:#}), authorizing");
            let token = oauth_manager
                .authenticate(code_source)
                .await
                .context("authorize user")?;
            let token = TimeBoundAccessToken::new(token);
            cache.save(&token).await.context("cache OAuth token")?;
            token
        }
    };

    let http_client = reqwest::Client::builder()
        .build()
        .context("build HTTP client")?;
    Ok(GoogleClient::new(
        token,
        oauth_manager,
        cache,
        config.endpoints.clone(),
        http_client,
    ))
}
