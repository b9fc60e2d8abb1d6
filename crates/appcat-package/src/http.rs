//! Blocking HTTP access to package repositories and the catalog API

use reqwest::blocking::{multipart::Form, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::io::{self, Write};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

/// Header carrying a pre-issued auth token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl HttpError {
    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout(err.to_string())
        } else if err.is_connect() {
            HttpError::Connection(err.to_string())
        } else if err.is_decode() {
            HttpError::Decode(err.to_string())
        } else {
            HttpError::Transport(err.to_string())
        }
    }
}

/// Retrieves documents by URL
pub trait Fetch {
    /// Read the whole body at `url` into memory
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError>;

    /// Stream the body at `url` into a temporary file owned by the caller
    fn fetch_to_file(&self, url: &str) -> Result<NamedTempFile, HttpError> {
        let body = self.fetch_bytes(url)?;
        let mut file = NamedTempFile::new()?;
        file.write_all(&body)?;
        file.flush()?;
        Ok(file)
    }
}

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            token: None,
        }
    }
}

/// Authenticated blocking HTTP client.
///
/// Every non-2xx response becomes [`HttpError::Status`] carrying the status
/// code and the response body; connection failures and timeouts get their
/// own variants.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("appcat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(HttpError::from_reqwest)?;

        Ok(Self {
            client,
            token: config.token,
        })
    }

    /// GET and decode a JSON body
    pub fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        let response = self.send(self.client.get(url))?;
        response.json().map_err(HttpError::from_reqwest)
    }

    /// POST a multipart form and decode the JSON answer
    pub fn post_multipart<T: DeserializeOwned>(&self, url: &str, form: Form) -> Result<T, HttpError> {
        let response = self.send(self.client.post(url).multipart(form))?;
        response.json().map_err(HttpError::from_reqwest)
    }

    pub fn delete(&self, url: &str) -> Result<(), HttpError> {
        self.send(self.client.delete(url))?;
        Ok(())
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, HttpError> {
        let request = match &self.token {
            Some(token) => request.header(AUTH_TOKEN_HEADER, token),
            None => request,
        };

        let response = request.send().map_err(HttpError::from_reqwest)?;
        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "HTTP response");

        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(HttpError::Status {
                status: status.as_u16(),
                body: error_message(&body),
            });
        }

        Ok(response)
    }
}

impl Fetch for HttpClient {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, HttpError> {
        let response = self.send(self.client.get(url))?;
        let body = response.bytes().map_err(HttpError::from_reqwest)?;
        Ok(body.to_vec())
    }

    fn fetch_to_file(&self, url: &str) -> Result<NamedTempFile, HttpError> {
        let mut response = self.send(self.client.get(url))?;
        let mut file = NamedTempFile::new()?;
        let written = response
            .copy_to(file.as_file_mut())
            .map_err(HttpError::from_reqwest)?;
        file.flush()?;
        debug!(url = %url, bytes = written, path = %file.path().display(), "downloaded to temp file");
        Ok(file)
    }
}

/// Pull the human-readable message out of an API error body.
///
/// The catalog answers with `{"error": {"message": ...}}` or
/// `{"message": ...}`; anything else is passed through trimmed.
fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
    });
    message.unwrap_or_else(|| body.trim().to_string())
}
