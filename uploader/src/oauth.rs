//! OAuth 2.0 against Google's identity provider.
//!
//! This module covers parsing the application's client descriptor, walking the user through
//! the authorization-code flow, and refreshing access tokens. Where the authorization code
//! comes from is left to an [`AuthorizationCodeSource`], so the flow can be driven from a
//! terminal, a browser, or a test.

use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, body};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::url::Url;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const OAUTH_DONE: &str = "<!DOCTYPE html>\
<html><head><title>recordings-uploader</title></head>\
<body><p>Authorization complete. You can close this window.</p></body></html>";

/// The OAuth client an application registered with Google.
///
/// This is the `installed` (or `web`) object of the `credentials.json` file that the Google
/// Cloud console hands out.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    /// Where the user is sent to grant access.
    pub auth_uri: String,
    /// Where codes and refresh tokens are exchanged for access tokens.
    pub token_uri: String,
    /// The first of these is used unless a local redirect server is running.
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CredentialsFile {
    Installed(ClientSecrets),
    Web(ClientSecrets),
}

impl ClientSecrets {
    /// Parses the contents of a `credentials.json` file.
    pub fn from_json(json: &str) -> eyre::Result<Self> {
        let file: CredentialsFile =
            serde_json::from_str(json).context("parse OAuth client descriptor")?;
        Ok(match file {
            CredentialsFile::Installed(s) | CredentialsFile::Web(s) => s,
        })
    }

    /// Reads and parses the `credentials.json` at `path`.
    pub async fn from_file(path: &Path) -> eyre::Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read OAuth client descriptor {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("load {}", path.display()))
    }

    /// The redirect the user is sent to when no local redirect server is involved.
    fn default_redirect_url(&self) -> eyre::Result<RedirectUrl> {
        let Some(uri) = self.redirect_uris.first() else {
            eyre::bail!("OAuth client descriptor lists no redirect URIs");
        };
        RedirectUrl::new(uri.clone()).context("parse redirect URI")
    }
}

/// Where the authorization code for a first-time authorization comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationCodeSource {
    /// Print the authorization URL and read the code the user pastes on standard input.
    ///
    /// The user may paste either the bare code or the whole URL they were redirected to.
    Prompt,
    /// Open the user's browser and receive the code on a temporary local redirect server.
    Loopback,
    /// Use a code that was obtained out of band.
    Preset(String),
}

/// Manages OAuth 2.0 flows for one application and set of scopes.
///
/// An HTTP client for the token endpoint is built for each exchange, so the manager itself
/// is cheap to clone.
#[derive(Debug, Clone)]
pub struct OAuthManager {
    secrets: ClientSecrets,
    scopes: Vec<String>,
}

impl OAuthManager {
    /// Creates a manager for the application described by `secrets`.
    ///
    /// `scopes` are requested on authorization; refreshed tokens keep whatever scopes were
    /// originally granted.
    pub fn new(secrets: ClientSecrets, scopes: Vec<String>) -> Self {
        Self { secrets, scopes }
    }

    fn http_client() -> eyre::Result<oauth2::reqwest::Client> {
        oauth2::reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")
    }

    /// Runs the authorization-code flow and returns the resulting token.
    ///
    /// The request asks for offline access so that the token comes with a refresh token, and
    /// uses PKCE unless the code is [`AuthorizationCodeSource::Preset`].
    pub async fn authenticate(
        &self,
        source: &AuthorizationCodeSource,
    ) -> eyre::Result<BasicTokenResponse> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.authenticate_with(source, stdin, tokio::io::stdout())
            .await
    }

    /// Like [`Self::authenticate`], but [`AuthorizationCodeSource::Prompt`] talks to the user
    /// through `input` and `output` rather than the terminal.
    async fn authenticate_with<R, W>(
        &self,
        source: &AuthorizationCodeSource,
        input: R,
        output: W,
    ) -> eyre::Result<BasicTokenResponse>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let csrf = CsrfToken::new_random();
        let (redirect_url, eventually_authorization_code) = match source {
            AuthorizationCodeSource::Loopback => {
                let (url, code) = setup_redirect(csrf.clone())
                    .await
                    .context("set up redirect endpoint")?;
                (url, Some(code))
            }
            _ => (self.secrets.default_redirect_url()?, None),
        };

        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(self.secrets.auth_uri.clone()).context("parse auth_uri")?)
            .set_token_uri(
                TokenUrl::new(self.secrets.token_uri.clone()).context("parse token_uri")?,
            )
            .set_redirect_uri(redirect_url);

        let auth_request = client
            // We never re-use the CSRF since we only go through the flow exactly once.
            .authorize_url(move || csrf.clone())
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent");
        // A preset code was issued for an authorization URL we never built, so it cannot be
        // bound to a PKCE challenge of ours.
        let (auth_request, pkce_verifier) = match source {
            AuthorizationCodeSource::Preset(_) => (auth_request, None),
            _ => {
                let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();
                (auth_request.set_pkce_challenge(challenge), Some(verifier))
            }
        };
        let (auth_url, _csrf_token) = auth_request.url();

        let authorization_code = match (source, eventually_authorization_code) {
            (_, Some(code)) => {
                tracing::info!(url = %auth_url, "asking user to follow OAuth flow");
                webbrowser::open(auth_url.as_ref()).context("open user's browser")?;
                code.await.context("await user authorization code")?
            }
            (AuthorizationCodeSource::Preset(code), None) => AuthorizationCode::new(code.clone()),
            (_, None) => prompt_for_code(&auth_url, input, output)
                .await
                .context("read authorization code")?,
        };

        let mut exchange = client.exchange_code(authorization_code);
        if let Some(verifier) = pkce_verifier {
            exchange = exchange.set_pkce_verifier(verifier);
        }
        let token = exchange
            .request_async(&Self::http_client()?)
            .await
            .context("exchange authorization code with access token")?;

        if token.refresh_token().is_none() {
            tracing::warn!("authorization did not yield a refresh token");
        }
        Ok(token)
    }

    /// Attempts to refresh an existing OAuth token using its refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded, new token is available
    /// * `Ok(None)` - No refresh token available, or the provider rejected it
    /// * `Err(_)` - Network or other error occurred during refresh attempt
    pub async fn refresh_token(
        &self,
        token: &BasicTokenResponse,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        let Some(refresh_token) = token.refresh_token() else {
            tracing::warn!("no refresh token available, cannot refresh");
            return Ok(None);
        };

        tracing::debug!("attempting to refresh OAuth token");

        let client = BasicClient::new(ClientId::new(self.secrets.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.secrets.client_secret.clone()))
            .set_token_uri(
                TokenUrl::new(self.secrets.token_uri.clone()).context("parse token_uri")?,
            );

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&Self::http_client()?)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}

/// Shows the user where to authorize and reads back the code they paste.
async fn prompt_for_code<R, W>(
    auth_url: &Url,
    mut input: R,
    mut output: W,
) -> eyre::Result<AuthorizationCode>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let prompt = format!("\nVisit this URL to get an authorization code: {auth_url}\n\nPaste code: ");
    output
        .write_all(prompt.as_bytes())
        .await
        .context("write prompt")?;
    output.flush().await.context("flush prompt")?;

    let mut line = String::new();
    let n = input.read_line(&mut line).await.context("read line")?;
    if n == 0 {
        eyre::bail!("input closed before an authorization code was entered");
    }
    let line = line.trim();
    if line.is_empty() {
        eyre::bail!("no authorization code entered");
    }

    // Loopback redirects to a port nobody listens on leave the code in the address bar.
    if let Ok(redirected) = Url::parse(line) {
        let code = redirected
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned());
        let Some(code) = code else {
            eyre::bail!("pasted URL carries no authorization code");
        };
        return Ok(AuthorizationCode::new(code));
    }
    Ok(AuthorizationCode::new(line.to_string()))
}

/// Sets up a local HTTP server to receive the OAuth authorization callback.
///
/// The server listens on a random local port, accepts a single connection, checks that the
/// callback carries the expected CSRF state, and hands back the authorization code.
///
/// # Returns
///
/// A tuple containing:
/// - The redirect URL to use in the OAuth flow
/// - A future that resolves to the authorization code when the callback is received
async fn setup_redirect(
    csrf: CsrfToken,
) -> eyre::Result<(
    RedirectUrl,
    impl Future<Output = eyre::Result<AuthorizationCode>>,
)> {
    let socket = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .context("bind to localhost")?;
    let addr = socket.local_addr().context("get local address")?;
    let url = RedirectUrl::new(format!("http://{}:{}", addr.ip(), addr.port()))
        .context("construct redirect url")?;
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let r = async move {
            let (conn, _) = socket.accept().await.context("accept")?;
            let conn = hyper_util::rt::TokioIo::new(conn);
            let (got, mut gotten) = tokio::sync::mpsc::channel(1);
            let service = service_fn(move |req: Request<body::Incoming>| {
                let csrf = csrf.clone();
                let got = got.clone();
                async move {
                    let mut presented_state = None;
                    let mut presented_code = None;
                    for (k, v) in form_urlencoded::parse(req.uri().query().unwrap_or("").as_bytes())
                    {
                        match &*k {
                            "state" => presented_state = Some(v),
                            "code" => presented_code = Some(v),
                            _ => {}
                        }
                    }
                    if presented_state.as_deref() != Some(csrf.secret().as_str()) {
                        return Err("invalid csrf token");
                    }
                    let Some(code) = presented_code else {
                        return Err("no authorization code found");
                    };
                    let code = AuthorizationCode::new(code.into_owned());
                    if got.send(code).await.is_err() {
                        return Err("redirect server already shut down");
                    }
                    Ok(Response::new(Full::<Bytes>::from(OAUTH_DONE)))
                }
            });
            let mut serve = std::pin::pin!(
                hyper::server::conn::http1::Builder::new().serve_connection(conn, service)
            );

            tokio::select! {
                exit = &mut serve => {
                    if let Err(e) = exit {
                        Err(e).context("redirect server got bad request")
                    } else {
                        eyre::bail!("redirect server exit prematurely");
                    }
                }
                code = gotten.recv() => {
                    serve.as_mut().graceful_shutdown();
                    // Let the browser see the response before the connection goes away.
                    let _ = serve.await;
                    code.ok_or_else(|| eyre::eyre!("redirect server dropped the code"))
                }
            }
        };
        let _ = tx.send(r.await);
    });
    Ok((url, async move {
        rx.await.context("redirect future dropped prematurely")?
    }))
}
