//! OAuth installed-app flow against Google's endpoints.
//!
//! The interactive step opens the system browser and waits for Google to
//! redirect back to a loopback listener with the authorization code. Token
//! material is persisted as JSON under the config directory and refreshed
//! silently on later runs; only the interactive consent is time-bounded.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::utils::browser;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Scope required to read document metadata, revisions and exports.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Treat tokens with less than this many minutes of validity as expired.
const EXPIRY_LEEWAY_MINUTES: i64 = 5;

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// OAuth client material from the "installed" section of a Google
/// `client_secrets.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Deserialize)]
struct ClientSecretsFile {
    installed: ClientSecrets,
}

impl ClientSecrets {
    /// Load the "installed" section from a client secrets file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        let file: ClientSecretsFile = serde_json::from_str(&json).map_err(|e| {
            Error::Config(format!(
                "cannot parse client secrets {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(file.installed)
    }
}

/// Persisted token material.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Whether the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => at < Utc::now() + chrono::Duration::minutes(EXPIRY_LEEWAY_MINUTES),
            None => false,
        }
    }
}

/// Load credentials from `path` if the file exists.
pub fn load_credentials(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)?;
    let credentials = serde_json::from_str(&json)
        .map_err(|e| Error::Auth(format!("corrupt token file {}: {}", path.display(), e)))?;
    Ok(Some(credentials))
}

/// Persist credentials as pretty JSON, creating the parent directory.
pub fn save_credentials(credentials: &Credentials, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(credentials).map_err(|e| Error::Parse(e.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Response from the token endpoint, for both the code exchange and the
/// refresh grant.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl TokenResponse {
    /// A refresh response may omit the refresh token; keep the old one.
    fn into_credentials(self, fallback_refresh: Option<String>) -> Result<Credentials> {
        if let Some(access_token) = self.access_token {
            return Ok(Credentials {
                access_token,
                refresh_token: self.refresh_token.or(fallback_refresh),
                expires_at: self
                    .expires_in
                    .map(|s| Utc::now() + chrono::Duration::seconds(s)),
            });
        }

        let error = self.error.unwrap_or_else(|| "unknown error".to_string());
        let description = self.error_description.unwrap_or_default();
        Err(Error::Auth(
            format!("{} {}", error, description).trim().to_string(),
        ))
    }
}

/// Obtain valid credentials: reuse, refresh, or run the interactive flow.
///
/// `timeout` bounds only the interactive browser consent; a silent refresh
/// is an ordinary token request.
pub fn obtain_credentials(config: &Config, timeout: Duration) -> Result<Credentials> {
    let secrets = ClientSecrets::load(&config.client_secrets)?;

    if let Some(credentials) = load_credentials(&config.token_path)? {
        if !credentials.is_expired() {
            return Ok(credentials);
        }
        if let Some(refresh_token) = credentials.refresh_token.clone() {
            tracing::info!("Refreshing expired access token");
            let refreshed =
                refresh_credentials(&secrets, &refresh_token).map_err(|e| match e {
                    Error::Auth(message) => Error::Auth(format!(
                        "{}; delete {} and re-authenticate",
                        message,
                        config.token_path.display()
                    )),
                    other => other,
                })?;
            save_credentials(&refreshed, &config.token_path)?;
            return Ok(refreshed);
        }
    }

    let credentials = interactive_flow(&secrets, timeout)?;
    save_credentials(&credentials, &config.token_path)?;
    Ok(credentials)
}

fn refresh_credentials(secrets: &ClientSecrets, refresh_token: &str) -> Result<Credentials> {
    let response = reqwest::blocking::Client::new()
        .post(&secrets.token_uri)
        .form(&[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()?;

    let token: TokenResponse = response.json().map_err(|e| Error::Parse(e.to_string()))?;
    token.into_credentials(Some(refresh_token.to_string()))
}

/// Run the browser consent flow, bounded by `timeout`.
///
/// A loopback listener on an ephemeral port receives Google's redirect. The
/// wait happens on a worker thread so the deadline stays firm while
/// `accept()` blocks; on timeout the thread is abandoned and dies with the
/// process.
fn interactive_flow(secrets: &ClientSecrets, timeout: Duration) -> Result<Credentials> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://127.0.0.1:{}", port);

    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let url = consent_url(secrets, &redirect_uri, &state)?;

    println!("Please authorize docrev to read the document in your browser.");
    if !browser::open(&url) {
        println!("Could not open a browser automatically. Visit this URL:");
        println!("{}", url);
    }

    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(wait_for_redirect(&listener));
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));

    let deadline = Instant::now() + timeout;
    let outcome = loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            spinner.finish_and_clear();
            return Err(Error::AuthTimeout(timeout.as_secs()));
        }
        spinner.set_message(format!(
            "Waiting for authorization in browser... ({}s left)",
            remaining.as_secs()
        ));

        match rx.recv_timeout(remaining.min(Duration::from_secs(1))) {
            Ok(outcome) => break outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                break Err(Error::Auth(
                    "redirect listener stopped unexpectedly".to_string(),
                ))
            }
        }
    };
    spinner.finish_and_clear();

    let redirect = outcome?;
    if redirect.state.as_deref() != Some(state.as_str()) {
        return Err(Error::Auth("state mismatch in OAuth redirect".to_string()));
    }

    exchange_code(secrets, &redirect.code, &redirect_uri)
}

/// Consent URL with offline access, so the answer carries a refresh token.
fn consent_url(secrets: &ClientSecrets, redirect_uri: &str, state: &str) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        &secrets.auth_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("state", state),
        ],
    )
    .map_err(|e| Error::Auth(format!("invalid auth endpoint: {}", e)))?;
    Ok(url.to_string())
}

/// The interesting parts of Google's redirect request.
#[derive(Debug, PartialEq)]
struct Redirect {
    code: String,
    state: Option<String>,
}

/// Accept connections until one carries the authorization redirect.
/// Stray requests (favicon and the like) get a 404 and are ignored.
fn wait_for_redirect(listener: &TcpListener) -> Result<Redirect> {
    loop {
        let (stream, _) = listener.accept()?;
        if let Some(redirect) = handle_connection(&stream) {
            return redirect;
        }
    }
}

fn handle_connection(mut stream: &TcpStream) -> Option<Result<Redirect>> {
    let mut request_line = String::new();
    if BufReader::new(stream).read_line(&mut request_line).is_err() {
        return None;
    }

    if !request_line.contains("code=") && !request_line.contains("error=") {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nConnection: close\r\n\r\n");
        return None;
    }

    let redirect = parse_redirect(&request_line);
    let body = if redirect.is_ok() {
        "Authorization complete. You may close this tab."
    } else {
        "Authorization failed. You may close this tab."
    };
    let _ = write!(
        stream,
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    Some(redirect)
}

/// Parse the query string out of the redirect request line,
/// e.g. `GET /?state=xyz&code=4%2F0Af HTTP/1.1`.
fn parse_redirect(request_line: &str) -> Result<Redirect> {
    let path = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::Auth("malformed redirect request".to_string()))?;

    let url = reqwest::Url::parse(&format!("http://127.0.0.1{}", path))
        .map_err(|e| Error::Auth(format!("malformed redirect request: {}", e)))?;

    let mut code = None;
    let mut state = None;
    let mut denied = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => denied = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = denied {
        return Err(Error::Auth(format!("consent was denied: {}", error)));
    }

    let code =
        code.ok_or_else(|| Error::Auth("redirect carried no authorization code".to_string()))?;
    Ok(Redirect { code, state })
}

fn exchange_code(secrets: &ClientSecrets, code: &str, redirect_uri: &str) -> Result<Credentials> {
    let response = reqwest::blocking::Client::new()
        .post(&secrets.token_uri)
        .form(&[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()?;

    let token: TokenResponse = response.json().map_err(|e| Error::Parse(e.to_string()))?;
    token.into_credentials(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "test-id.apps.googleusercontent.com".to_string(),
            client_secret: "test-secret".to_string(),
            auth_uri: default_auth_uri(),
            token_uri: default_token_uri(),
        }
    }

    #[test]
    fn test_save_load_credentials_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("token.json");

        let credentials = Credentials {
            access_token: "access-123".to_string(),
            refresh_token: Some("refresh-456".to_string()),
            expires_at: Some(Utc::now() + chrono::Duration::hours(1)),
        };

        save_credentials(&credentials, &path).unwrap();
        let loaded = load_credentials(&path).unwrap().unwrap();

        assert_eq!(loaded.access_token, credentials.access_token);
        assert_eq!(loaded.refresh_token, credentials.refresh_token);
    }

    #[test]
    fn test_load_credentials_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = load_credentials(&temp_dir.path().join("token.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_expired_credentials() {
        let credentials = Credentials {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
        };
        assert!(credentials.is_expired());
    }

    #[test]
    fn test_near_expiry_counts_as_expired() {
        // Four minutes left is inside the five-minute leeway.
        let credentials = Credentials {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + chrono::Duration::minutes(4)),
        };
        assert!(credentials.is_expired());
    }

    #[test]
    fn test_credentials_without_expiry_are_valid() {
        let credentials = Credentials {
            access_token: "access".to_string(),
            refresh_token: None,
            expires_at: None,
        };
        assert!(!credentials.is_expired());
    }

    #[test]
    fn test_client_secrets_parsing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("client_secrets.json");
        std::fs::write(
            &path,
            r#"{"installed":{"client_id":"abc","client_secret":"xyz"}}"#,
        )
        .unwrap();

        let secrets = ClientSecrets::load(&path).unwrap();
        assert_eq!(secrets.client_id, "abc");
        assert_eq!(secrets.token_uri, "https://oauth2.googleapis.com/token");
    }

    #[test]
    fn test_consent_url_parameters() {
        let url = consent_url(&secrets(), "http://127.0.0.1:4567", "state-token").unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=test-id.apps.googleusercontent.com"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=state-token"));
        // The scope must be percent-encoded into a single parameter.
        assert!(url.contains("scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fdrive"));
    }

    #[test]
    fn test_parse_redirect_code_and_state() {
        let redirect =
            parse_redirect("GET /?state=xyz&code=4%2F0Atest HTTP/1.1\r\n").unwrap();
        assert_eq!(redirect.code, "4/0Atest");
        assert_eq!(redirect.state.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_parse_redirect_denied() {
        let result = parse_redirect("GET /?error=access_denied HTTP/1.1\r\n");
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_parse_redirect_without_code() {
        let result = parse_redirect("GET /?state=xyz HTTP/1.1\r\n");
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    #[test]
    fn test_token_response_keeps_fallback_refresh() {
        let response = TokenResponse {
            access_token: Some("new-access".to_string()),
            refresh_token: None,
            expires_in: Some(3600),
            error: None,
            error_description: None,
        };
        let credentials = response
            .into_credentials(Some("old-refresh".to_string()))
            .unwrap();
        assert_eq!(credentials.refresh_token.as_deref(), Some("old-refresh"));
        assert!(!credentials.is_expired());
    }

    #[test]
    fn test_token_response_error() {
        let response = TokenResponse {
            access_token: None,
            refresh_token: None,
            expires_in: None,
            error: Some("invalid_grant".to_string()),
            error_description: Some("Token has been revoked.".to_string()),
        };
        let result = response.into_credentials(None);
        assert!(matches!(result, Err(Error::Auth(_))));
    }

    // The interactive flow itself is not unit tested: it needs a browser
    // and network access.
}
