//! reqwest-backed transport

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use url::Url;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::transport::Transport;

const AUTH_HEADER: &str = "X-Auth-Token";

/// HTTP transport for the feed manager API
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    token: String,
}

impl HttpTransport {
    /// Create a new transport from connection settings
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut base_url = Url::parse(&config.url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.insecure)
            .user_agent(concat!("feedmgr/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTH_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send(
        &self,
        method: &'static str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();

        tracing::debug!(method, path, status = status.as_u16(), "API request");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(method, path, status = status.as_u16(), "API request failed");
            return Err(TransportError::Status {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn server(&self) -> String {
        self.base_url.to_string()
    }

    async fn get_object(&self, path: &str, query: &[(String, String)]) -> Result<Value, TransportError> {
        let request = self.client.get(self.url(path)?).query(query);
        let response = self.send("GET", path, request).await?;
        Ok(response.json().await?)
    }

    async fn post_object(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let request = self.client.post(self.url(path)?).json(body);
        let response = self.send("POST", path, request).await?;
        Ok(response.json().await?)
    }

    async fn put_object(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let request = self.client.put(self.url(path)?).json(body);
        let response = self.send("PUT", path, request).await?;
        Ok(response.json().await?)
    }

    async fn delete_object(&self, path: &str) -> Result<(), TransportError> {
        let request = self.client.delete(self.url(path)?);
        self.send("DELETE", path, request).await?;
        Ok(())
    }
}
