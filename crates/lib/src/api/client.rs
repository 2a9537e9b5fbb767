//! Authenticated JSON client for the dashboard backend.
//! Attaches `Authorization: <scheme> <token>` to every request and maps HTTP failures to [`ApiError`].

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::config::{self, Config};

const DEFAULT_BASE_URL: &str = "http://localhost:8002";
const GENERIC_FAILURE: &str = "request to backend failed";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authorized, log in again")]
    Unauthorized,
    #[error("access denied: you do not have permission for this resource")]
    Forbidden,
    #[error("backend error ({status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("backend request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status carried by the error, when the backend answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Forbidden => Some(403),
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

/// Client for the backend REST API. Cheap to clone; clones share the token.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    auth_scheme: String,
    token: Arc<RwLock<Option<String>>>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url,
            auth_scheme: "Token".to_string(),
            token: Arc::new(RwLock::new(None)),
            client: reqwest::Client::new(),
        }
    }

    /// Build from config: base URL (PAINEL_BASE_URL wins), auth scheme, timeout, and static token.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            base_url: config::resolve_base_url(config),
            auth_scheme: config.backend.auth_scheme.trim().to_string(),
            token: Arc::new(RwLock::new(config::resolve_api_token(config))),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn set_token(&self, token: Option<String>) {
        *self.token.write().await = token;
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    async fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token.read().await.as_deref() {
            Some(t) => req.header(
                reqwest::header::AUTHORIZATION,
                format!("{} {}", self.auth_scheme, t),
            ),
            None => req,
        }
    }

    /// GET `path` (relative to the base URL, query string included) and decode the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("GET {}", url);
        let req = self.authorize(self.client.get(&url)).await;
        let res = req.send().await?;
        decode(res).await
    }

    /// POST a JSON body to `path` and decode the JSON response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("POST {}", url);
        let req = self.authorize(self.client.post(&url).json(body)).await;
        let res = req.send().await?;
        decode(res).await
    }
}

async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, ApiError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(error_for_status(status, &body));
    }
    let bytes = res.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Map a non-success response to an error: 401/403 get fixed messages, everything else carries the
/// backend's `detail` text (or the raw body, or a generic message).
pub(crate) fn error_for_status(status: StatusCode, body: &str) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden,
        _ => ApiError::Api {
            status: status.as_u16(),
            detail: detail_from_body(body),
        },
    }
}

fn detail_from_body(body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .and_then(|d| d.as_str())
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty());
    if let Some(detail) = from_json {
        return detail;
    }
    let raw = body.trim();
    if raw.is_empty() || raw.starts_with('<') {
        GENERIC_FAILURE.to_string()
    } else {
        raw.to_string()
    }
}
