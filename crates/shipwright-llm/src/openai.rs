use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::{FinishReason, ProviderAdapter, Request, Response, Role, Usage};
use shipwright_types::config::{DEFAULT_HTTP_TIMEOUT, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use shipwright_types::{redact_credentials, Secret, ShipwrightError};

// ---------------------------------------------------------------------------
// OpenAiAdapter
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct OpenAiAdapter {
    api_key: Secret,
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    timeout: Duration,
}

impl OpenAiAdapter {
    pub fn new(api_key: Secret) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            default_model: DEFAULT_OPENAI_MODEL.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Total time allowed per completion request, connecting included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn scrub(&self, text: &str) -> String {
        redact_credentials(text, &[self.api_key.expose()])
    }

    fn failure(&self, status: u16, message: &str) -> ShipwrightError {
        ShipwrightError::ProviderError {
            provider: "openai".into(),
            status,
            message: self.scrub(message),
        }
    }

    fn transport_failure(&self, status: u16, e: reqwest::Error) -> ShipwrightError {
        if e.is_timeout() {
            self.failure(status, &format!("no response within {}s", self.timeout.as_secs_f32()))
        } else {
            self.failure(status, &e.to_string())
        }
    }

    fn build_request_body(&self, request: &Request) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request
            .messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                json!({ "role": role, "content": msg.content })
            })
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }

        body
    }

    fn parse_response(&self, body: serde_json::Value) -> Result<Response, ShipwrightError> {
        let id = body["id"].as_str().unwrap_or("").to_string();
        let model = body["model"].as_str().unwrap_or("").to_string();

        let choice = &body["choices"][0];
        let text = choice["message"]["content"]
            .as_str()
            .ok_or_else(|| ShipwrightError::ProviderError {
                provider: "openai".into(),
                status: 200,
                message: "response has no message content".into(),
            })?
            .to_string();

        let finish_reason = match choice["finish_reason"].as_str() {
            Some("length") => FinishReason::MaxTokens,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::EndTurn,
        };

        let usage_obj = &body["usage"];
        let input_tokens = usage_obj["prompt_tokens"].as_u64().unwrap_or(0);
        let output_tokens = usage_obj["completion_tokens"].as_u64().unwrap_or(0);
        let usage = Usage {
            input_tokens,
            output_tokens,
            total_tokens: usage_obj["total_tokens"]
                .as_u64()
                .unwrap_or(input_tokens + output_tokens),
        };

        Ok(Response {
            id,
            text,
            usage,
            model,
            finish_reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------


fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// ProviderAdapter implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    async fn complete(&self, request: &Request) -> Result<Response, ShipwrightError> {
        let body = self.build_request_body(request);

        tracing::debug!(model = %request.model, messages = request.messages.len(), "LLM request");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_failure(0, e))?;

        let status = resp.status();
        let response_body = resp
            .text()
            .await
            .map_err(|e| self.transport_failure(status.as_u16(), e))?;

        if !status.is_success() {
            return Err(self.failure(status.as_u16(), &extract_error_message(&response_body)));
        }

        let json: serde_json::Value = serde_json::from_str(&response_body).map_err(|e| {
            self.failure(status.as_u16(), &format!("Failed to parse response JSON: {e}"))
        })?;

        let response = self.parse_response(json)?;
        tracing::debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            finish = ?response.finish_reason,
            "LLM response"
        );
        Ok(response)
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> OpenAiAdapter {
        OpenAiAdapter::new(Secret::new("test-key"))
    }

    #[test]
    fn build_request_body_produces_chat_completions_shape() {
        let req = Request::instructions("gpt-4", "You are an expert web developer.", "Brief: x")
            .with_max_tokens(4000)
            .with_temperature(0.7);

        let body = adapter().build_request_body(&req);

        assert_eq!(body["model"], "gpt-4");
        let messages = body["messages"].as_array().expect("messages should be an array");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "You are an expert web developer.");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[1]["content"], "Brief: x");
        assert_eq!(body["max_tokens"], 4000);
        let temp = body["temperature"].as_f64().unwrap();
        assert!((temp - 0.7).abs() < 0.01);
    }

    #[test]
    fn build_request_body_without_optional_fields() {
        let req = Request::instructions("gpt-4", "s", "u");
        let body = adapter().build_request_body(&req);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn parse_response_extracts_first_choice() {
        let response_json = json!({
            "id": "chatcmpl-123",
            "model": "gpt-4-0613",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "{\"index.html\": \"<html></html>\"}" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 120, "completion_tokens": 30, "total_tokens": 150 }
        });

        let resp = adapter().parse_response(response_json).unwrap();
        assert_eq!(resp.id, "chatcmpl-123");
        assert_eq!(resp.model, "gpt-4-0613");
        assert_eq!(resp.text, "{\"index.html\": \"<html></html>\"}");
        assert_eq!(resp.finish_reason, FinishReason::EndTurn);
        assert_eq!(resp.usage.input_tokens, 120);
        assert_eq!(resp.usage.output_tokens, 30);
        assert_eq!(resp.usage.total_tokens, 150);
    }

    #[test]
    fn parse_response_maps_length_to_max_tokens() {
        let response_json = json!({
            "choices": [{ "message": { "content": "{\"a\": " }, "finish_reason": "length" }]
        });
        let resp = adapter().parse_response(response_json).unwrap();
        assert_eq!(resp.finish_reason, FinishReason::MaxTokens);
    }

    #[test]
    fn parse_response_without_content_is_an_error() {
        let err = adapter()
            .parse_response(json!({ "choices": [] }))
            .unwrap_err();
        assert!(matches!(err, ShipwrightError::ProviderError { .. }));
    }

    #[test]
    fn error_mapping_extracts_message() {
        let message = extract_error_message(r#"{"error": {"message": "overloaded"}}"#);
        match adapter().failure(503, &message) {
            ShipwrightError::ProviderError { status, message, .. } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected ProviderError, got {other:?}"),
        }
    }

    #[test]
    fn error_mapping_falls_back_to_raw_body() {
        let message = extract_error_message("upstream down");
        assert!(adapter().failure(502, &message).to_string().contains("upstream down"));
    }

    #[test]
    fn error_messages_never_carry_the_key() {
        let body = r#"{"error": {"message": "Incorrect API key provided: test-key"}}"#;
        let err = adapter().failure(401, &extract_error_message(body));
        let rendered = err.to_string();
        assert!(!rendered.contains("test-key"), "{rendered}");
        assert!(rendered.contains("Incorrect API key provided"));
    }

    /// Accepts connections and never writes a byte back.
    async fn silent_listener() -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        addr
    }

    #[tokio::test]
    async fn unresponsive_backend_times_out_as_provider_error() {
        let addr = silent_listener().await;
        let adapter = adapter()
            .with_base_url(format!("http://{addr}"))
            .with_timeout(Duration::from_millis(200));
        let req = Request::instructions("gpt-4", "s", "u");

        let result = tokio::time::timeout(Duration::from_secs(10), adapter.complete(&req))
            .await
            .expect("adapter must give up on its own");

        match result {
            Err(ShipwrightError::ProviderError { status, message, .. }) => {
                assert_eq!(status, 0);
                assert!(message.contains("no response within"), "{message}");
            }
            other => panic!("expected ProviderError, got {other:?}"),
        }
    }

    #[test]
    fn with_base_url_and_model() {
        let adapter = adapter()
            .with_base_url("http://localhost:8080/")
            .with_model("gpt-4o-mini");
        assert_eq!(adapter.base_url, "http://localhost:8080");
        assert_eq!(adapter.default_model(), "gpt-4o-mini");
        assert_eq!(adapter.name(), "openai");
        assert_eq!(adapter.timeout, DEFAULT_HTTP_TIMEOUT);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let rendered = format!("{:?}", adapter());
        assert!(!rendered.contains("test-key"));
    }
}
