use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde_json::Value;

use crate::cli::config::{current_server, load_environment_config};

/// Thin JSON client for the admin API. Sends the stored session token as a
/// bearer credential and unwraps the `{ success, data }` envelope.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{message} ({status}, {code})")]
    Api { status: StatusCode, code: String, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClientError {
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            ClientError::Http(_) => None,
        }
    }
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token,
        }
    }

    /// Client for the current server, carrying the stored session if it has not expired
    pub fn from_environment() -> anyhow::Result<Self> {
        let (_, server) = current_server()?;
        let token = load_environment_config()?
            .session
            .filter(|s| !s.is_expired())
            .map(|s| s.token);
        Ok(Self::new(server.url, token))
    }

    pub fn require_session(self) -> anyhow::Result<Self> {
        if self.token.is_none() {
            anyhow::bail!("Not logged in; run `tenant-admin auth login` first");
        }
        Ok(self)
    }

    pub async fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.send::<()>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, ClientError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<Value, ClientError> {
        self.send::<()>(Method::POST, path, None).await
    }

    async fn send<B: Serialize>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await.unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(ClientError::Api {
                status,
                code: payload["code"].as_str().unwrap_or("UNKNOWN").to_string(),
                message: payload["error"].as_str().unwrap_or("request failed").to_string(),
            });
        }

        Ok(payload.get("data").cloned().unwrap_or(payload))
    }
}
