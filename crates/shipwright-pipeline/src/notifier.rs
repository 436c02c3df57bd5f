//! Evaluation callback delivery with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use shipwright_types::{redact_credentials, EvaluationPayload, NotifyResult, ShipwrightError};

use crate::retry::{execute_with_retry, Exhausted, RetryPolicy, Sleeper};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Status and (when it was JSON) body of one callback response.
#[derive(Debug, Clone)]
pub struct CallbackResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

/// Delivers one evaluation payload. Retrying is the notifier's job.
#[async_trait]
pub trait EvaluationTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        payload: &EvaluationPayload,
    ) -> shipwright_types::Result<CallbackResponse>;
}

/// JSON POST over reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EvaluationTransport for HttpTransport {
    async fn post(
        &self,
        url: &str,
        payload: &EvaluationPayload,
    ) -> shipwright_types::Result<CallbackResponse> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| ShipwrightError::Http {
                target: "evaluation callback".into(),
                message: e.to_string(),
            })?;
        let status = response.status().as_u16();
        let body = response.json::<serde_json::Value>().await.ok();
        Ok(CallbackResponse { status, body })
    }
}

pub struct Notifier {
    transport: Arc<dyn EvaluationTransport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
}

impl Notifier {
    pub fn new(transport: Arc<dyn EvaluationTransport>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::evaluation_callback(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// POST `payload` to `callback_url` until it answers 200.
    ///
    /// Any other status, a transport error, or an attempt exceeding the
    /// per-attempt timeout consumes one attempt.
    pub async fn notify(
        &self,
        payload: &EvaluationPayload,
        callback_url: &str,
    ) -> shipwright_types::Result<NotifyResult> {
        let outcome = execute_with_retry(
            |attempt| async move {
                tracing::debug!(attempt, task = %payload.task, "Posting evaluation");
                match tokio::time::timeout(
                    self.attempt_timeout,
                    self.transport.post(callback_url, payload),
                )
                .await
                {
                    Err(_) => Err(format!(
                        "no response within {}s",
                        self.attempt_timeout.as_secs_f64()
                    )),
                    Ok(Err(e)) => Err(redact_credentials(&e.to_string(), &[])),
                    Ok(Ok(response)) if response.status == 200 => Ok(response.body),
                    Ok(Ok(response)) => Err(format!("callback returned HTTP {}", response.status)),
                }
            },
            &self.policy,
            self.sleeper.as_ref(),
            "evaluation callback",
        )
        .await;

        match outcome {
            Ok((response, attempts)) => {
                tracing::info!(task = %payload.task, attempts, "Evaluation submitted");
                Ok(NotifyResult { attempts, response })
            }
            Err(Exhausted {
                attempts,
                last_error,
            }) => Err(ShipwrightError::NotifyExhausted {
                attempts,
                last_error,
            }),
        }
    }
}
