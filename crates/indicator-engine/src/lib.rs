pub mod error;
pub mod process_client;
pub mod stub;
pub mod types;

use async_trait::async_trait;

pub use error::{EngineError, EngineResult};
pub use process_client::ProcessIndicatorEngine;
pub use stub::StubIndicatorEngine;
pub use types::{
    Aggressiveness, Direction, EngineCandle, EngineIndicators, EngineSignal, EngineVotes,
    RiskReport, RiskRequest, ScanRequest, ScanResponse, SymbolCandles,
};

/// Typed wrapper around the external native-engine collaborator. The
/// process-backed implementation is swapped for [`StubIndicatorEngine`] in
/// tests, matching the donor's trait-plus-HTTP-impl split for out-of-process
/// collaborators (`MLProvider`, `BrokerClient`).
#[async_trait]
pub trait IndicatorEngine: Send + Sync {
    /// Cheap presence check — missing binary means the pipeline falls
    /// through to the LLM path without attempting a spawn.
    async fn is_available(&self) -> bool;

    async fn scan(&self, request: ScanRequest) -> EngineResult<ScanResponse>;

    async fn risk(&self, request: RiskRequest) -> EngineResult<RiskReport>;
}
