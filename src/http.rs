//! HTTP transport seam.
//!
//! Every outbound call (feed sources, article pages, image downloads and the
//! WordPress REST API) goes through the [`Transport`] trait. Production code
//! uses [`ReqwestTransport`], a thin wrapper around one shared
//! `reqwest::Client` carrying the per-request deadline and user agent. Tests
//! swap in an in-memory fake that records every request.

use crate::error::Result;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::{debug, instrument};

/// An outbound request, independent of the HTTP library that sends it.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// First value of a header, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[cfg(test)]
    pub fn text_body(status: u16, content_type: &str, body: &str) -> Self {
        Self {
            status,
            content_type: Some(content_type.to_string()),
            body: body.as_bytes().to_vec(),
        }
    }

    #[cfg(test)]
    pub fn json_body(status: u16, value: &serde_json::Value) -> Self {
        Self {
            status,
            content_type: Some("application/json; charset=UTF-8".to_string()),
            body: value.to_string().into_bytes(),
        }
    }
}

/// Capability to perform one HTTP exchange.
pub trait Transport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

/// [`Transport`] backed by `reqwest`.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    #[instrument(level = "debug", skip_all, fields(method = %request.method, url = %request.url))]
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        debug!(status, bytes = body.len(), "Received response");
        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeTransport;
    use super::*;

    #[test]
    fn test_request_builder_headers() {
        let req = HttpRequest::get("https://example.com")
            .header("Authorization", "Basic abc")
            .header("Content-Type", "image/png");
        assert_eq!(req.header_value("authorization"), Some("Basic abc"));
        assert_eq!(req.header_value("content-type"), Some("image/png"));
        assert_eq!(req.header_value("x-missing"), None);
    }

    #[test]
    fn test_response_success_range() {
        assert!(HttpResponse::text_body(201, "text/plain", "").is_success());
        assert!(!HttpResponse::text_body(301, "text/plain", "").is_success());
        assert!(!HttpResponse::text_body(500, "text/plain", "").is_success());
    }

    #[tokio::test]
    async fn test_fake_transport_routes_and_records() {
        let fake = FakeTransport::new().on(
            Method::GET,
            "https://example.com/a",
            HttpResponse::text_body(200, "text/plain", "hello"),
        );
        let transport = &fake;

        let hit = transport.send(HttpRequest::get("https://example.com/a")).await.unwrap();
        assert_eq!(hit.text(), "hello");

        let miss = transport.send(HttpRequest::get("https://example.com/b")).await.unwrap();
        assert_eq!(miss.status, 404);

        assert_eq!(fake.count(&Method::GET, "https://example.com/a"), 1);
        assert_eq!(fake.requests().len(), 2);
    }
}
