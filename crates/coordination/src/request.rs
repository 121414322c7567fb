use async_trait::async_trait;
use reqwest::Client;
use shared::{
    error::RequestError,
    protocol::{Method, RequestOptions, Response},
};
use tracing::debug;

/// Network seam consumed by the widgets: `request(url, options) -> { ok, status, body }`.
#[async_trait]
pub trait RequestClient: Send + Sync {
    async fn request(&self, url: &str, options: RequestOptions) -> Result<Response, RequestError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpRequestClient {
    http: Client,
}

impl HttpRequestClient {
    pub fn new(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RequestClient for HttpRequestClient {
    async fn request(&self, url: &str, options: RequestOptions) -> Result<Response, RequestError> {
        let method = match options.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        debug!(%method, url, "request: sending");

        let mut builder = self.http.request(method, url);
        for (name, value) in &options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = options.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| RequestError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|err| RequestError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        Ok(Response {
            ok: status.is_success(),
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
#[path = "tests/request_tests.rs"]
mod tests;
