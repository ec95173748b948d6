use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{LlmError, LlmResult};
use crate::provider::LlmProvider;
use crate::types::{ApprovalRequest, ApprovalResponse, FallbackContext, FallbackResponse};

/// In-memory provider used by tests: returns fixed, caller-supplied
/// responses and can simulate a permanently-open circuit without any
/// network access.
pub struct StubLlmClient {
    approval: Mutex<ApprovalResponse>,
    fallback: Mutex<FallbackResponse>,
    circuit_open: AtomicBool,
    approvals_seen: Mutex<Vec<ApprovalRequest>>,
}

impl StubLlmClient {
    pub fn new(approval: ApprovalResponse, fallback: FallbackResponse) -> Self {
        Self {
            approval: Mutex::new(approval),
            fallback: Mutex::new(fallback),
            circuit_open: AtomicBool::new(false),
            approvals_seen: Mutex::new(Vec::new()),
        }
    }

    pub fn approve_all() -> Self {
        Self::new(
            ApprovalResponse {
                approved: true,
                reason: "stub always approves".into(),
                gate_scores: None,
            },
            FallbackResponse::default(),
        )
    }

    pub fn with_circuit_open() -> Self {
        let client = Self::approve_all();
        client.circuit_open.store(true, Ordering::Relaxed);
        client
    }

    pub fn approvals_seen(&self) -> usize {
        self.approvals_seen.lock().expect("stub mutex poisoned").len()
    }
}

#[async_trait]
impl LlmProvider for StubLlmClient {
    async fn approve_signal(&self, request: ApprovalRequest) -> LlmResult<ApprovalResponse> {
        if self.circuit_open.load(Ordering::Relaxed) {
            return Err(LlmError::CircuitOpen);
        }
        self.approvals_seen.lock().expect("stub mutex poisoned").push(request);
        Ok(self.approval.lock().expect("stub mutex poisoned").clone())
    }

    async fn propose_signals(&self, _context: FallbackContext) -> LlmResult<FallbackResponse> {
        if self.circuit_open.load(Ordering::Relaxed) {
            return Err(LlmError::CircuitOpen);
        }
        Ok(self.fallback.lock().expect("stub mutex poisoned").clone())
    }

    fn is_circuit_open(&self) -> bool {
        self.circuit_open.load(Ordering::Relaxed)
    }
}
