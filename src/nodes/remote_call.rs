//! REMOTE_CALL handler: forwards the current parameters to an external
//! endpoint and parses the response by content type.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::definition::NodeSpec;
use crate::error::{NodeError, NodeResult};
use crate::http::{HttpClient, HttpMethod, HttpRequest};
use crate::nodes::registry::NodeHandler;
use crate::xml::xml_to_value;

pub struct RemoteCallHandler {
    client: Arc<dyn HttpClient>,
    default_timeout_ms: u64,
}

impl RemoteCallHandler {
    pub fn new(client: Arc<dyn HttpClient>, default_timeout_ms: u64) -> Self {
        RemoteCallHandler {
            client,
            default_timeout_ms,
        }
    }
}

#[async_trait]
impl NodeHandler for RemoteCallHandler {
    async fn execute(&self, node: &NodeSpec, parameters: &Value) -> NodeResult<Value> {
        let config = &node.config;

        let url = config
            .get("apiUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                NodeError::ValidationError("REMOTE_CALL requires an 'apiUrl' string".to_string())
            })?;

        let method_raw = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET");
        let method = HttpMethod::parse(method_raw).ok_or_else(|| {
            NodeError::ValidationError(format!("unsupported HTTP method: {method_raw}"))
        })?;

        let timeout_ms = config
            .get("timeout")
            .and_then(Value::as_u64)
            .unwrap_or(self.default_timeout_ms);

        // Configured headers ride on top of the JSON content type; a
        // configured content-type wins.
        let mut headers: Vec<(String, String)> = Vec::new();
        if let Some(configured) = config.get("headers").and_then(Value::as_object) {
            for (key, value) in configured {
                let value = value
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| {
                        NodeError::ValidationError(format!(
                            "header '{key}' must be a string value"
                        ))
                    })?;
                headers.push((key.clone(), value));
            }
        }
        if !headers
            .iter()
            .any(|(key, _)| key.eq_ignore_ascii_case("content-type"))
        {
            headers.insert(
                0,
                ("Content-Type".to_string(), "application/json".to_string()),
            );
        }

        // The current parameters travel as the JSON body for every method,
        // GET included.
        let body = serde_json::to_string(parameters)?;

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers,
            body: Some(body),
            timeout: Duration::from_millis(timeout_ms),
        };

        let response = self.client.send(request).await?;

        if !response.is_success() {
            let preview: String = response.body.chars().take(256).collect();
            return Err(NodeError::HttpError(format!(
                "remote call returned status {}: {preview}",
                response.status
            )));
        }

        let content_type = response.content_type().to_string();
        if content_type.contains("application/json") {
            Ok(serde_json::from_str(&response.body)?)
        } else if content_type.contains("application/xml") || content_type.contains("text/xml") {
            xml_to_value(&response.body)
        } else {
            Ok(Value::String(response.body))
        }
    }
}
