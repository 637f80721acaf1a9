pub mod audit;
pub mod decision;
pub mod error;
pub mod memory;
pub mod observe;
pub mod pipeline;
pub mod queue;
pub mod secrets;
pub mod tracker;

pub use audit::{AuditEntry, AuditLog, ulid_new};
pub use decision::Emission;
pub use error::{Error, Result};
pub use memory::{MemoryClient, MemoryError};
pub use observe::{Observation, compress_observation, normalize_error};
pub use pipeline::Pipeline;
pub use queue::CaptureQueue;
pub use secrets::scrub;
pub use tracker::Tracker;
