use serde_json::{Value, json};
use std::fmt;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::time::Duration;
use ward_core::breaker::{BreakerConfig, CircuitBreaker};
use ward_core::clock::{Clock, SystemClock};
use ward_core::paths::WardPaths;
use ward_types::Tier;

/// Service key the memory socket is circuit-broken under.
const SERVICE: &str = "memory_socket";

/// Hard per-request timeout. No retries: a slow worker must not stall
/// the pipeline, and the caller fails open anyway.
const TIMEOUT: Duration = Duration::from_secs(2);

const MAX_FRAME: u32 = 8 * 1024 * 1024;

/// The worker being down is a normal condition, not a pipeline failure.
#[derive(Debug)]
pub enum MemoryError {
    /// Socket missing, connection refused, timeout, or circuit open.
    Unavailable(String),

    /// The worker answered with something other than the frame protocol.
    Protocol(String),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::Unavailable(msg) => write!(f, "memory worker unavailable: {}", msg),
            MemoryError::Protocol(msg) => write!(f, "memory worker protocol error: {}", msg),
        }
    }
}

impl std::error::Error for MemoryError {}

/// Blocking UDS client for the memory worker.
///
/// Frames are 4-byte big-endian length followed by one JSON document,
/// both directions. Every failure feeds the `memory_socket` circuit so
/// a dead worker stops costing 2 s per gate that wants it.
pub struct MemoryClient {
    paths: WardPaths,
    breaker: CircuitBreaker,
    clock: Box<dyn Clock>,
}

impl MemoryClient {
    pub fn new(paths: WardPaths) -> Self {
        let breaker = CircuitBreaker::new(paths.circuits_file(), BreakerConfig::memory_socket());
        MemoryClient {
            paths,
            breaker,
            clock: Box::new(SystemClock),
        }
    }

    pub fn request(&mut self, method: &str, params: Value) -> Result<Value, MemoryError> {
        let now = self.clock.epoch_secs();
        if self.breaker.should_skip(SERVICE, Tier::Two, now) {
            return Err(MemoryError::Unavailable("circuit open".to_string()));
        }
        let outcome = self.request_inner(method, params);
        self.breaker
            .record_result(SERVICE, Tier::Two, outcome.is_ok(), now);
        outcome
    }

    fn request_inner(&self, method: &str, params: Value) -> Result<Value, MemoryError> {
        let socket_path = self.paths.memory_socket();
        let mut stream = UnixStream::connect(&socket_path)
            .map_err(|err| MemoryError::Unavailable(format!("connect: {err}")))?;
        stream
            .set_read_timeout(Some(TIMEOUT))
            .and_then(|()| stream.set_write_timeout(Some(TIMEOUT)))
            .map_err(|err| MemoryError::Unavailable(format!("timeout setup: {err}")))?;

        let request = json!({"method": method, "params": params});
        let body = request.to_string().into_bytes();
        let header = (body.len() as u32).to_be_bytes();
        stream
            .write_all(&header)
            .and_then(|()| stream.write_all(&body))
            .map_err(|err| MemoryError::Unavailable(format!("send: {err}")))?;

        let mut len_buf = [0u8; 4];
        stream
            .read_exact(&mut len_buf)
            .map_err(|err| MemoryError::Unavailable(format!("recv header: {err}")))?;
        let frame_len = u32::from_be_bytes(len_buf);
        if frame_len > MAX_FRAME {
            return Err(MemoryError::Protocol(format!(
                "oversized frame ({frame_len} bytes)"
            )));
        }
        let mut frame = vec![0u8; frame_len as usize];
        stream
            .read_exact(&mut frame)
            .map_err(|err| MemoryError::Unavailable(format!("recv body: {err}")))?;
        serde_json::from_slice(&frame)
            .map_err(|err| MemoryError::Protocol(format!("bad JSON frame: {err}")))
    }

    pub fn ping(&mut self) -> Result<Value, MemoryError> {
        self.request("ping", json!({}))
    }

    pub fn count(&mut self) -> Result<Value, MemoryError> {
        self.request("count", json!({}))
    }

    pub fn query(&mut self, text: &str, limit: usize) -> Result<Value, MemoryError> {
        self.request("query", json!({"text": text, "limit": limit}))
    }

    pub fn get(&mut self, id: &str) -> Result<Value, MemoryError> {
        self.request("get", json!({"id": id}))
    }

    pub fn upsert(&mut self, document: &str, metadata: Value) -> Result<Value, MemoryError> {
        self.request("upsert", json!({"document": document, "metadata": metadata}))
    }

    pub fn delete(&mut self, id: &str) -> Result<Value, MemoryError> {
        self.request("delete", json!({"id": id}))
    }
}
