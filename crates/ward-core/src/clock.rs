use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// Single seam for time. Durations come off the monotonic clock at the
/// call sites that need them; everything TTL-shaped goes through
/// `epoch_secs` so tests can inject a fake.
pub trait Clock: Send + Sync {
    /// Wall-clock time, used for audit ids and daily file names only.
    fn now_wall(&self) -> DateTime<Utc>;

    /// Seconds since the Unix epoch as a float, matching the resolution
    /// the on-disk records use.
    fn epoch_secs(&self) -> f64;
}

/// The real OS clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_wall(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn epoch_secs(&self) -> f64 {
        let now = Utc::now();
        now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
    }
}

/// Hand-cranked clock for tests. Cloning shares the underlying instant so
/// a test can keep a handle and advance time after wiring it in.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn at(epoch_secs: f64) -> Self {
        let clock = ManualClock::default();
        clock.set(epoch_secs);
        clock
    }

    pub fn set(&self, epoch_secs: f64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = epoch_secs;
        }
    }

    pub fn advance(&self, secs: f64) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += secs;
        }
    }
}

impl Clock for ManualClock {
    fn now_wall(&self) -> DateTime<Utc> {
        let secs = self.epoch_secs();
        DateTime::from_timestamp(secs as i64, ((secs.fract()) * 1e9) as u32).unwrap_or_default()
    }

    fn epoch_secs(&self) -> f64 {
        self.now.lock().map(|guard| *guard).unwrap_or(0.0)
    }
}
