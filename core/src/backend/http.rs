use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::BackendConfig;

use super::traits::{Completion, InvokeError, InvokeRequest, ModelInvoker};

/// JSON-over-HTTP inference invoker.
///
/// Posts a message-style payload to the configured endpoint and reads back
/// either a flat `{"text": ...}` response or a content-block list.
pub struct HttpModelInvoker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpModelInvoker {
    pub fn new(cfg: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ModelInvoker for HttpModelInvoker {
    async fn invoke(&self, request: &InvokeRequest) -> Result<Completion, InvokeError> {
        let payload = serde_json::json!({
            "model": request.model_id,
            "system": request.system_prompt,
            "messages": [
                { "role": "user", "content": request.user_prompt }
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| InvokeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvokeError::Upstream {
                status: status.as_u16(),
                body: body.trim_end().to_string(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| InvokeError::Payload(e.to_string()))?;

        let text = extract_text(&body)
            .ok_or_else(|| InvokeError::Payload("response carries no text content".to_string()))?;

        let usage = body.get("usage");
        let input_tokens = usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let output_tokens = usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        Ok(Completion {
            text,
            input_tokens,
            output_tokens,
        })
    }
}

/// Accept both a flat text field and anthropic-style content blocks.
fn extract_text(body: &Value) -> Option<String> {
    if let Some(text) = body.get("text").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    let blocks = body.get("content")?.as_array()?;
    let mut out = String::new();
    for block in blocks {
        if block.get("type").and_then(Value::as_str) == Some("text") {
            if let Some(text) = block.get("text").and_then(Value::as_str) {
                out.push_str(text);
            }
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InvokeRequest {
        InvokeRequest {
            model_id: "test-model".to_string(),
            system_prompt: "system".to_string(),
            user_prompt: "user".to_string(),
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    fn invoker_for(url: &str) -> HttpModelInvoker {
        HttpModelInvoker::new(&BackendConfig {
            endpoint: format!("{url}/invoke"),
            connect_timeout_secs: 5,
            request_timeout_secs: 5,
        })
        .expect("client")
    }

    #[tokio::test]
    async fn parses_flat_text_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/invoke")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"hello","usage":{"input_tokens":12,"output_tokens":7}}"#)
            .create_async()
            .await;

        let completion = invoker_for(&server.url())
            .invoke(&request())
            .await
            .expect("invoke");
        assert_eq!(completion.text, "hello");
        assert_eq!(completion.input_tokens, 12);
        assert_eq!(completion.output_tokens, 7);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn parses_content_block_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/invoke")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":[{"type":"text","text":"a"},{"type":"text","text":"b"}]}"#)
            .create_async()
            .await;

        let completion = invoker_for(&server.url())
            .invoke(&request())
            .await
            .expect("invoke");
        assert_eq!(completion.text, "ab");
        assert_eq!(completion.input_tokens, 0);
    }

    #[tokio::test]
    async fn non_2xx_surfaces_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/invoke")
            .with_status(503)
            .with_body("throttled, slow down")
            .create_async()
            .await;

        let err = invoker_for(&server.url())
            .invoke(&request())
            .await
            .expect_err("should fail");
        let message = err.to_string();
        assert!(message.contains("503"));
        assert!(message.contains("throttled"));
    }
}
