use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::error::{EngineError, EngineResult};
use crate::types::{EngineRequest, EngineResponseEnvelope, RiskReport, RiskRequest, ScanRequest, ScanResponse};
use crate::IndicatorEngine;

/// Talks to the external deterministic scanner over a one-shot stdin/stdout
/// JSON-RPC call per invocation. Each call spawns a fresh child process,
/// writes a single request object, closes stdin, and reads stdout to
/// completion or until the configured deadline — there is no long-lived
/// child, matching the "process is single-call per spawn" contract.
pub struct ProcessIndicatorEngine {
    binary_path: PathBuf,
    timeout: Duration,
    max_input_bytes: usize,
    concurrency: Arc<Semaphore>,
}

impl ProcessIndicatorEngine {
    pub fn new(binary_path: impl Into<PathBuf>, timeout: Duration, max_input_bytes: usize, max_concurrent: usize) -> Self {
        Self {
            binary_path: binary_path.into(),
            timeout,
            max_input_bytes,
            concurrency: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    async fn invoke(&self, command: &str, data: serde_json::Value) -> EngineResult<serde_json::Value> {
        let request = EngineRequest { command, data };
        let payload = serde_json::to_vec(&request).map_err(|e| EngineError::InvalidJson(e.to_string()))?;
        if payload.len() > self.max_input_bytes {
            return Err(EngineError::PayloadTooLarge(self.max_input_bytes));
        }

        // Acquired before spawn, held until the process exits: gives the
        // FIFO queueing the contract requires since tokio's semaphore wakes
        // waiters in acquire order.
        let _permit = self
            .concurrency
            .acquire()
            .await
            .expect("engine semaphore is never closed");

        let mut child = Command::new(&self.binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::SpawnFailed(e.to_string()))?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin
            .write_all(&payload)
            .await
            .map_err(EngineError::Io)?;
        drop(stdin);

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EngineError::Timeout(self.timeout.as_millis() as u64))?
            .map_err(EngineError::Io)?;

        if !output.status.success() {
            return Err(EngineError::NonZeroExit(output.status.code().unwrap_or(-1)));
        }

        let envelope: EngineResponseEnvelope =
            serde_json::from_slice(&output.stdout).map_err(|e| EngineError::InvalidJson(e.to_string()))?;

        if !envelope.success {
            return Err(EngineError::EngineFailure(
                envelope.error.unwrap_or_else(|| "unknown engine error".into()),
            ));
        }

        Ok(envelope.data)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    use super::*;
    use crate::types::{Aggressiveness, ScanRequest};

    /// Writes a tiny shell script that sleeps then echoes a fixed success
    /// envelope, standing in for the real engine binary.
    fn write_stub_binary(dir: &std::path::Path, sleep_ms: u64) -> PathBuf {
        let path = dir.join("stub-engine.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "#!/bin/sh\nsleep {}\ncat <<'EOF'\n{{\"success\":true,\"data\":{{\"signals\":[]}}}}\nEOF\n",
            sleep_ms as f64 / 1000.0
        )
        .unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn caps_concurrent_invocations_at_configured_limit() {
        let dir = tempdir();
        let binary = write_stub_binary(dir.path(), 150);
        let engine = Arc::new(ProcessIndicatorEngine::new(
            binary,
            Duration::from_secs(5),
            2 * 1024 * 1024,
            2,
        ));

        let request = ScanRequest {
            symbols: vec![],
            aggressiveness: Aggressiveness::Medium,
        };

        let mut handles = Vec::new();
        for _ in 0..3 {
            let engine = Arc::clone(&engine);
            let request = request.clone();
            handles.push(tokio::spawn(async move { engine.scan(request).await }));
        }

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
    }

    fn tempdir() -> tempdir_shim::TempDir {
        tempdir_shim::TempDir::new()
    }

    /// Minimal self-cleaning temp dir so this crate doesn't need to pull in
    /// the `tempfile` crate for a single test helper.
    mod tempdir_shim {
        pub struct TempDir(std::path::PathBuf);

        impl TempDir {
            pub fn new() -> Self {
                let mut path = std::env::temp_dir();
                path.push(format!("indicator-engine-test-{}", std::process::id()));
                std::fs::create_dir_all(&path).unwrap();
                Self(path)
            }

            pub fn path(&self) -> &std::path::Path {
                &self.0
            }
        }

        impl Drop for TempDir {
            fn drop(&mut self) {
                let _ = std::fs::remove_dir_all(&self.0);
            }
        }
    }
}

#[async_trait]
impl IndicatorEngine for ProcessIndicatorEngine {
    async fn is_available(&self) -> bool {
        tokio::fs::metadata(&self.binary_path).await.is_ok()
    }

    async fn scan(&self, request: ScanRequest) -> EngineResult<ScanResponse> {
        let data = serde_json::to_value(&request).map_err(|e| EngineError::InvalidJson(e.to_string()))?;
        let raw = self.invoke("scan", data).await?;
        serde_json::from_value(raw).map_err(|e| EngineError::InvalidJson(e.to_string()))
    }

    async fn risk(&self, request: RiskRequest) -> EngineResult<RiskReport> {
        let data = serde_json::to_value(&request).map_err(|e| EngineError::InvalidJson(e.to_string()))?;
        let raw = self.invoke("risk", data).await?;
        serde_json::from_value(raw).map_err(|e| EngineError::InvalidJson(e.to_string()))
    }
}
