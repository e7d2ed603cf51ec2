//! REST API helper
//!
//! Thin wrapper over `reqwest` for the university backend's JSON API.
//! Requests never return `Err`: every failure is folded into an
//! `ApiResponse` whose `error` is a display-ready message.

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of an API call, shaped for direct use by a view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
}

impl<T> ApiResponse<T> {
    /// A request in flight
    pub fn loading() -> Self {
        Self {
            data: None,
            error: None,
            loading: true,
        }
    }

    pub fn success(data: Option<T>) -> Self {
        Self {
            data,
            error: None,
            loading: false,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
            loading: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        !self.loading && self.error.is_none()
    }
}

/// Messages used when a request fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorTable {
    /// 400 with neither `Errors` nor `error` in the body
    pub bad_request: String,
    /// 404
    pub not_found: String,
    /// 500, or no HTTP status at all (network failure)
    pub unexpected: String,
    /// Any other status
    pub fallback: String,
}

impl Default for ErrorTable {
    fn default() -> Self {
        Self {
            bad_request: "An unexpected error occurred".to_string(),
            not_found: "Sunucu hatası".to_string(),
            unexpected: "UnexpectedErrorOccurred".to_string(),
            fallback: "beklenmeyen hata".to_string(),
        }
    }
}

impl ErrorTable {
    /// Message for a failed request
    ///
    /// For 400 the backend's validation messages (`Errors[].Message`) are
    /// joined with ". "; failing that its `error` string is used.
    pub fn message_for(&self, status: Option<u16>, body: Option<&Value>) -> String {
        match status {
            Some(400) => body
                .and_then(validation_messages)
                .or_else(|| {
                    body.and_then(|b| b.get("error"))
                        .and_then(Value::as_str)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| self.bad_request.clone()),
            Some(404) => self.not_found.clone(),
            Some(500) | None => self.unexpected.clone(),
            Some(_) => self.fallback.clone(),
        }
    }
}

fn validation_messages(body: &Value) -> Option<String> {
    let messages: Vec<&str> = body
        .get("Errors")?
        .as_array()?
        .iter()
        .filter_map(|e| e.get("Message").and_then(Value::as_str))
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join(". "))
    }
}

/// Successful responses wrap their payload in `data`
#[derive(Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

/// Client for the backend REST API
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    errors: ErrorTable,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("unibot-session/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SessionError::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            token: None,
            errors: ErrorTable::default(),
        })
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        Self::new(config.api_url.clone())
    }

    /// Attach a bearer token to every request
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_error_table(mut self, errors: ErrorTable) -> Self {
        self.errors = errors;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for an API path
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send a JSON request and unwrap the `data` field of the response
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> ApiResponse<T> {
        let url = self.url_for(path);
        let mut request = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json;charset=UTF-8");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(method = %method, url = %url, error = %e, "API request failed");
                return ApiResponse::failure(self.errors.message_for(None, None));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body: Option<Value> = response.json().await.ok();
            tracing::debug!(method = %method, url = %url, status = status.as_u16(), "API error response");
            return ApiResponse::failure(self.errors.message_for(Some(status.as_u16()), body.as_ref()));
        }

        match response.json::<DataEnvelope<T>>().await {
            Ok(envelope) => ApiResponse::success(envelope.data),
            Err(e) => {
                tracing::warn!(method = %method, url = %url, error = %e, "Failed to parse API response");
                ApiResponse::failure(self.errors.message_for(None, None))
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResponse<T> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> ApiResponse<T> {
        self.request(Method::POST, path, Some(body)).await
    }
}
