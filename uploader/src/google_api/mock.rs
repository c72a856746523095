//! Stand-in Google server for tests.
//!
//! The server records every request it receives and answers with whatever the test's handler
//! returns. All APIs, the OAuth token endpoint included, are served under the same base URL
//! following the layout of [`Endpoints::under`].

use crate::config::{Endpoints, default_scopes};
use crate::credentials::TokenCache;
use crate::google_api::client::{GoogleClient, TimeBoundAccessToken};
use crate::oauth::{ClientSecrets, OAuthManager};
use bytes::Bytes;
use http::{HeaderMap, Method, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{Request, body};
use oauth2::basic::BasicTokenResponse;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

/// A request as seen by [`MockGoogle`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl RecordedRequest {
    pub(crate) fn query(&self, name: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }

    pub(crate) fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    pub(crate) fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub(crate) fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body is JSON")
    }
}

type Handler = dyn Fn(&RecordedRequest, &str) -> Response<Full<Bytes>> + Send + Sync;

pub(crate) struct MockGoogle {
    base: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockGoogle {
    /// Starts serving on an ephemeral local port.
    ///
    /// `handler` is given each request along with the server's base URL.
    pub(crate) async fn start<H>(handler: H) -> Self
    where
        H: Fn(&RecordedRequest, &str) -> Response<Full<Bytes>> + Send + Sync + 'static,
    {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");
        let base = format!("http://{addr}");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let server_base = base.clone();
        let server_requests = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((conn, _)) = listener.accept().await {
                let base = server_base.clone();
                let requests = Arc::clone(&server_requests);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<body::Incoming>| {
                        let base = base.clone();
                        let requests = Arc::clone(&requests);
                        let handler = Arc::clone(&handler);
                        async move {
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await?.to_bytes();
                            let recorded = RecordedRequest {
                                method: parts.method,
                                path: parts.uri.path().to_string(),
                                query: form_urlencoded::parse(
                                    parts.uri.query().unwrap_or("").as_bytes(),
                                )
                                .into_owned()
                                .collect(),
                                headers: parts.headers,
                                body,
                            };
                            requests
                                .lock()
                                .expect("mock request log poisoned")
                                .push(recorded.clone());
                            Ok::<_, hyper::Error>(handler(&recorded, &base))
                        }
                    });
                    let _ = hyper::server::conn::http1::Builder::new()
                        .serve_connection(hyper_util::rt::TokioIo::new(conn), service)
                        .await;
                });
            }
        });

        Self { base, requests }
    }

    pub(crate) fn base(&self) -> &str {
        &self.base
    }

    /// Every request received so far, in arrival order.
    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("mock request log poisoned")
            .clone()
    }

    pub(crate) fn secrets(&self) -> ClientSecrets {
        ClientSecrets {
            client_id: "test-client".to_string(),
            client_secret: "test-secret".to_string(),
            auth_uri: format!("{}/auth", self.base),
            token_uri: format!("{}/token", self.base),
            redirect_uris: vec!["http://localhost".to_string()],
        }
    }

    /// A `credentials.json` describing [`Self::secrets`].
    pub(crate) fn credentials_json(&self) -> String {
        let s = self.secrets();
        serde_json::json!({
            "installed": {
                "client_id": s.client_id,
                "client_secret": s.client_secret,
                "auth_uri": s.auth_uri,
                "token_uri": s.token_uri,
                "redirect_uris": s.redirect_uris,
            }
        })
        .to_string()
    }

    /// A client talking to this server, caching tokens in `cache_dir/token.json`.
    pub(crate) fn client(
        &self,
        cache_dir: &Path,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: SystemTime,
    ) -> GoogleClient {
        let token: BasicTokenResponse =
            serde_json::from_str(&token_json(access_token, refresh_token, 3600))
                .expect("token JSON parses");
        GoogleClient::new(
            TimeBoundAccessToken::with_expiry(token, Some(expires_at)),
            OAuthManager::new(self.secrets(), default_scopes()),
            TokenCache::new(cache_dir.join("token.json")),
            Endpoints::under(&self.base),
            reqwest::Client::new(),
        )
    }
}

/// A token endpoint response body.
pub(crate) fn token_json(access_token: &str, refresh_token: Option<&str>, expires_in: u64) -> String {
    let mut token = serde_json::json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": expires_in,
    });
    if let Some(refresh_token) = refresh_token {
        token["refresh_token"] = refresh_token.into();
    }
    token.to_string()
}

pub(crate) fn response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .expect("valid mock response")
}

pub(crate) fn json_response(body: &str) -> Response<Full<Bytes>> {
    response(StatusCode::OK, body)
}
