// OAuth 2.0 + PKCE authorization flow for the Spotify Web API.
// Public client: no secret is stored or sent; the code verifier takes
// its place at token-exchange time.

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tiny_http::{Response, Server};
use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};

const CALLBACK_PORT: u16 = 8888;
const TOKEN_ENDPOINT: &str = "https://accounts.spotify.com/api/token";
const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
const SCOPES: &str = "playlist-read-private playlist-read-collaborative";

/// How long the callback listener waits before giving up.
const CALLBACK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

// ============================================================================
// PKCE helper functions
// ============================================================================

/// Generate a random code verifier for PKCE (64 raw bytes, URL-safe encoded)
fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

/// Derive the code challenge from a verifier (S256 method)
fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a random state parameter for CSRF protection
fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let bytes: Vec<u8> = (0..16).map(|_| rng.gen()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}

// ============================================================================
// Flow
// ============================================================================

/// A bearer token for the metadata API. Held in memory only.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_in: i64,
}

/// One authorization attempt. Verifier and state live exactly as long as
/// the flow; a new `PkceFlow` means fresh values.
pub struct PkceFlow {
    client_id: String,
    code_verifier: String,
    state: String,
    redirect_uri: String,
}

impl PkceFlow {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            code_verifier: generate_code_verifier(),
            state: generate_state(),
            redirect_uri: format!("http://127.0.0.1:{}/callback", CALLBACK_PORT),
        }
    }

    /// The authorization URL the user must visit in a browser.
    pub fn auth_url(&self) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&code_challenge_method=S256&code_challenge={}&state={}",
            AUTHORIZE_ENDPOINT,
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(SCOPES),
            generate_code_challenge(&self.code_verifier),
            self.state
        )
    }

    /// Run the whole flow: bind the loopback listener, surface the
    /// authorization URL through `present`, wait for exactly one callback,
    /// then exchange the code for a token. One attempt; no retry.
    pub async fn authorize(self, present: impl FnOnce(&str)) -> Result<AuthSession> {
        let server = Server::http(("127.0.0.1", CALLBACK_PORT))
            .map_err(|e| Error::Auth(format!("failed to bind callback listener: {}", e)))?;

        present(&self.auth_url());
        info!("oauth: waiting for browser callback on port {}", CALLBACK_PORT);

        let code = self.wait_for_callback(&server).await?;
        drop(server);

        self.exchange_code(&code).await
    }

    /// Block (with a poll loop) until the callback arrives or the timeout
    /// expires. Returns the authorization code.
    async fn wait_for_callback(&self, server: &Server) -> Result<String> {
        let start = std::time::Instant::now();

        loop {
            if start.elapsed() > CALLBACK_TIMEOUT {
                return Err(Error::Auth("login timed out after 5 minutes".to_string()));
            }

            let Some(request) = server
                .try_recv()
                .map_err(|e| Error::Auth(format!("callback listener error: {}", e)))?
            else {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                continue;
            };

            let url_str = format!("http://127.0.0.1{}", request.url());
            let Ok(callback_url) = Url::parse(&url_str) else {
                request
                    .respond(Response::from_string("Not Found").with_status_code(404))
                    .ok();
                continue;
            };

            let params: HashMap<String, String> = callback_url
                .query_pairs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            if let Some(error) = params.get("error") {
                let message = params
                    .get("error_description")
                    .cloned()
                    .unwrap_or_else(|| error.clone());
                request.respond(failure_page(&message)).ok();
                return Err(Error::Auth(format!("authorization denied: {}", message)));
            }

            if let Some(code) = params.get("code") {
                let received_state = params.get("state").map(String::as_str).unwrap_or("");
                if received_state != self.state {
                    request.respond(failure_page("invalid state parameter")).ok();
                    return Err(Error::Auth(
                        "state mismatch - possible CSRF attack".to_string(),
                    ));
                }

                request.respond(success_page()).ok();
                info!("oauth: authorization code received");
                return Ok(code.clone());
            }

            // Favicon probes and the like get a 404 and we keep waiting
            request
                .respond(Response::from_string("Not Found").with_status_code(404))
                .ok();
        }
    }

    /// Exchange the authorization code for an access token. No secret is
    /// sent; the verifier proves possession of the original request.
    async fn exchange_code(&self, code: &str) -> Result<AuthSession> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: i64,
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let response = client
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("code_verifier", self.code_verifier.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("oauth: token exchange rejected: {}", body);
            return Err(Error::Auth(format!("token exchange failed: {}", body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("failed to parse token response: {}", e)))?;

        info!("oauth: access token obtained (expires in {}s)", token.expires_in);
        Ok(AuthSession {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

fn success_page() -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(
        "<html><head><style>
            body { font-family: -apple-system, 'Segoe UI', Roboto, sans-serif;
                   display: flex; justify-content: center; align-items: center;
                   height: 100vh; background: #16213e; color: white; }
            h1 { color: #4CAF50; }
        </style></head>
        <body><div style='text-align:center'>
            <h1>Login Successful</h1>
            <p>You can close this window and return to the terminal.</p>
        </div></body></html>",
    )
    .with_header(
        tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..])
            .expect("static header"),
    )
}

fn failure_page(message: &str) -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string(format!(
        "<html><body><h1>Login Failed</h1><p>{}</p></body></html>",
        message
    ))
}
