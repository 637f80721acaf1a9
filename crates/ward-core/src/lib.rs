pub mod fsio;

pub mod breaker;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod paths;
pub mod profiles;
pub mod ratelimit;
pub mod registry;
pub mod router;
pub mod sideband;
pub mod state;
pub mod telemetry;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitRecord, CircuitState};
pub use cache::{CacheStats, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{Error, Result};
pub use paths::{WardPaths, resolve_root};
pub use profiles::{DEFAULT_PROFILE, GateMode, VALID_PROFILES, gate_mode, is_disabled, profile_for};
pub use ratelimit::RateLimiter;
pub use registry::{GATE_MODULES, GateSpec, applicable_to, tier_of, validate};
pub use router::Router;
pub use state::{
    BlockOutcome, RATE_WINDOW_S, STATE_VERSION, SessionState, StateStore, TimingStat,
};
pub use telemetry::{EventBus, GateTimings, Metrics};
