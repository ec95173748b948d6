use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{LlmError, LlmResult};
use crate::types::{
    ApprovalRequest, ApprovalResponse, CircuitSnapshot, FallbackContext, FallbackResponse,
};

/// Backend-agnostic interface for the JSON-mode completion model used to
/// validate native-engine signals and, when the engine is unavailable, to
/// propose signals directly.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn approve_signal(&self, request: ApprovalRequest) -> LlmResult<ApprovalResponse>;

    async fn propose_signals(&self, context: FallbackContext) -> LlmResult<FallbackResponse>;

    fn is_circuit_open(&self) -> bool;

    /// `None` for providers with no durable breaker to snapshot (e.g. the
    /// test stub). Backs `circuit_breaker_state`'s shutdown flush.
    async fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        None
    }

    /// Resumes a breaker from a snapshot loaded at startup. A no-op for
    /// providers that don't carry a breaker at all.
    async fn restore_circuit(&self, _snapshot: CircuitSnapshot) {}
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    response_format: ResponseFormat,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(serde::Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// HTTP-backed JSON-mode completion client, guarded by a [`CircuitBreaker`]
/// so a flaky or rate-limited endpoint degrades into "skip LLM validation /
/// skip LLM fallback" rather than stalling a cycle.
pub struct HttpLlmClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl HttpLlmClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
        circuit_failure_threshold: u32,
        circuit_cool_down: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
            breaker: CircuitBreaker::new(circuit_failure_threshold, circuit_cool_down),
        }
    }

    async fn complete(&self, prompt: String) -> LlmResult<String> {
        let request = ChatRequest {
            model: &self.model,
            response_format: ResponseFormat { kind: "json_object" },
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.http
                .post(&self.api_url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.timeout.as_millis() as u64))?
        .map_err(LlmError::Transport)?
        .error_for_status()
        .map_err(LlmError::Transport)?;

        let completion: ChatCompletion = response.json().await.map_err(LlmError::Transport)?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("empty choices array".into()))
    }
}

fn approval_prompt(request: &ApprovalRequest) -> String {
    format!(
        "You are a trading risk reviewer. Given this proposed {direction:?} signal for {symbol} \
         with confidence {confidence:.2} and indicator snapshot {indicators}, respond with JSON \
         {{\"approved\": bool, \"reason\": \"<one line>\"}}. Reject low-conviction or contradictory \
         setups.",
        direction = request.direction,
        symbol = request.symbol,
        confidence = request.confidence,
        indicators = request.indicators,
    )
}

fn fallback_prompt(context: &FallbackContext) -> String {
    format!(
        "You are a trading signal generator for Indian equities, commodities and currency \
         derivatives. Given quotes {quotes:?}, recent history {history:?}, open positions \
         {positions:?} and options context {options:?}, propose up to 5 signals with confidence \
         >= 0.6 as JSON {{\"signals\": [{{\"symbol\": str, \"action\": \"BUY\"|\"SELL\"|\"HOLD\", \
         \"confidence\": f64}}]}}. Omit HOLD entries.",
        quotes = context.quotes,
        history = context.recent_history,
        positions = context.open_positions,
        options = context.options_context,
    )
}

#[async_trait]
impl LlmProvider for HttpLlmClient {
    async fn approve_signal(&self, request: ApprovalRequest) -> LlmResult<ApprovalResponse> {
        let prompt = approval_prompt(&request);
        self.breaker
            .call(|| async {
                let raw = self.complete(prompt).await?;
                serde_json::from_str(&raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))
            })
            .await
    }

    async fn propose_signals(&self, context: FallbackContext) -> LlmResult<FallbackResponse> {
        let prompt = fallback_prompt(&context);
        self.breaker
            .call(|| async {
                let raw = self.complete(prompt).await?;
                serde_json::from_str(&raw).map_err(|e| LlmError::InvalidResponse(e.to_string()))
            })
            .await
    }

    fn is_circuit_open(&self) -> bool {
        self.breaker.is_open_sync()
    }

    async fn circuit_snapshot(&self) -> Option<CircuitSnapshot> {
        Some(self.breaker.snapshot().await)
    }

    async fn restore_circuit(&self, snapshot: CircuitSnapshot) {
        self.breaker.restore(snapshot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LlmDirection;

    #[test]
    fn approval_prompt_mentions_symbol_and_direction() {
        let request = ApprovalRequest {
            symbol: "RELIANCE".into(),
            direction: LlmDirection::Buy,
            confidence: 0.72,
            indicators: serde_json::json!({"rsi_14": 61.0}),
        };
        let prompt = approval_prompt(&request);
        assert!(prompt.contains("RELIANCE"));
        assert!(prompt.contains("Buy"));
    }
}
