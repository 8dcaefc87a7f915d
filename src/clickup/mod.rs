pub mod api;
pub mod wire;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde_json::Value;

use crate::config::Limits;
use crate::error::{MigrateError, Result};

/// Minimal transport the engine needs. Paths are relative to the API base
/// and already carry their query string.
#[async_trait]
pub trait Remote: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value>;
    async fn put(&self, path: &str, body: &Value) -> Result<Value>;
}

pub struct HttpRemote {
    base_url: String,
    client: Client,
}

impl HttpRemote {
    pub fn new(token: &str, limits: &Limits) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let auth = header::HeaderValue::from_str(token)
            .map_err(|e| MigrateError::config(format!("token is not a valid header value: {e}")))?;
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(limits.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| MigrateError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: limits.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = self.client.request(method, self.endpoint(path));
        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source| MigrateError::Transport {
            path: path.to_string(),
            source,
        };
        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            let fallback = format!(
                "{} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            );
            let message = wire::error_message(&text).unwrap_or(fallback);
            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(MigrateError::Authentication(message));
            }
            return Err(MigrateError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        parse_body(path, &text)
    }
}

/// 2xx bodies may be empty (some updates answer with nothing).
fn parse_body(path: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(text).map_err(|source| MigrateError::Decode {
        path: path.to_string(),
        source,
    })
}

#[async_trait]
impl Remote for HttpRemote {
    async fn get(&self, path: &str) -> Result<Value> {
        tracing::debug!(path, "GET");
        self.send(Method::GET, path, None).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Value> {
        tracing::debug!(path, %body, "PUT");
        match self.send(Method::PUT, path, Some(body)).await {
            // Success already happened remotely; an unreadable body is not a failure.
            Err(MigrateError::Decode { .. }) => Ok(Value::Object(Default::default())),
            other => other,
        }
    }
}
