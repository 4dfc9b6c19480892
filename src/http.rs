//! HTTP transport boundary for REMOTE_CALL nodes.
//!
//! The handler talks to a [`HttpClient`] trait object so it carries no
//! network-stack responsibility of its own; [`ReqwestHttpClient`] is the
//! default implementation. Tests inject stub clients.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{NodeError, NodeResult};

/// The method families REMOTE_CALL configs may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    /// Case-insensitive parse; anything outside the supported set is None.
    pub fn parse(raw: &str) -> Option<HttpMethod> {
        match raw.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
}

/// Response snapshot handed back to the handler. Header names are
/// lowercased.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn content_type(&self) -> &str {
        self.headers
            .get("content-type")
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Injected transport. Implementations decide retryability: an error
/// returned as [`NodeError::Retryable`] will be retried by the dispatcher,
/// anything else halts the run.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> NodeResult<HttpResponse>;
}

/// Default reqwest-backed client.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> NodeResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| NodeError::HttpError(e.to_string()))?;
        Ok(ReqwestHttpClient { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> NodeResult<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &request.headers {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(key.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        builder = builder.headers(headers).timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| NodeError::HttpError(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_lowercase(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| NodeError::HttpError(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parse() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("post"), Some(HttpMethod::Post));
        assert_eq!(HttpMethod::parse("Put"), Some(HttpMethod::Put));
        assert_eq!(HttpMethod::parse("DELETE"), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::parse("PATCH"), None);
        assert_eq!(HttpMethod::parse(""), None);
    }

    #[test]
    fn test_response_success_range() {
        let response = HttpResponse {
            status: 204,
            headers: HashMap::new(),
            body: String::new(),
        };
        assert!(response.is_success());

        let response = HttpResponse {
            status: 301,
            headers: HashMap::new(),
            body: String::new(),
        };
        assert!(!response.is_success());
    }

    #[test]
    fn test_content_type_lookup() {
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/json; charset=utf-8".to_string(),
        );
        let response = HttpResponse {
            status: 200,
            headers,
            body: String::new(),
        };
        assert!(response.content_type().contains("application/json"));

        let bare = HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: String::new(),
        };
        assert_eq!(bare.content_type(), "");
    }

    #[test]
    fn test_reqwest_client_builds() {
        assert!(ReqwestHttpClient::new().is_ok());
    }
}
