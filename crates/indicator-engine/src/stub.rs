use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::EngineResult;
use crate::types::{RiskReport, RiskRequest, ScanRequest, ScanResponse};
use crate::IndicatorEngine;

/// In-memory engine used by tests: returns a fixed, caller-supplied
/// response for every `scan`/`risk` call rather than spawning a process.
/// `available` toggles `is_available` so pipeline tests can exercise the
/// "engine absent, fall back to LLM" branch.
pub struct StubIndicatorEngine {
    available: bool,
    scan_response: Mutex<ScanResponse>,
    risk_response: Mutex<Option<RiskReport>>,
    calls: Mutex<Vec<ScanRequest>>,
}

impl StubIndicatorEngine {
    pub fn new(available: bool, scan_response: ScanResponse) -> Self {
        Self {
            available,
            scan_response: Mutex::new(scan_response),
            risk_response: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(false, ScanResponse::default())
    }

    pub fn with_risk(mut self, risk: RiskReport) -> Self {
        self.risk_response = Mutex::new(Some(risk));
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("stub mutex poisoned").len()
    }
}

#[async_trait]
impl IndicatorEngine for StubIndicatorEngine {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn scan(&self, request: ScanRequest) -> EngineResult<ScanResponse> {
        self.calls.lock().expect("stub mutex poisoned").push(request);
        Ok(self.scan_response.lock().expect("stub mutex poisoned").clone())
    }

    async fn risk(&self, _request: RiskRequest) -> EngineResult<RiskReport> {
        Ok(self
            .risk_response
            .lock()
            .expect("stub mutex poisoned")
            .clone()
            .unwrap_or(RiskReport {
                sharpe_ratio: 1.0,
                sortino_ratio: 1.2,
                var_95: 0.02,
                max_drawdown_percent: 5.0,
                volatility: 0.15,
            }))
    }
}
