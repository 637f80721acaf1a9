use crate::audit::AuditLog;
use crate::decision::Emission;
use crate::error::Result;
use crate::observe::compress_observation;
use crate::queue::CaptureQueue;
use crate::tracker::Tracker;
use serde_json::json;
use std::time::Instant;
use ward_core::breaker::{BreakerConfig, CircuitBreaker};
use ward_core::cache::ResultCache;
use ward_core::clock::{Clock, SystemClock};
use ward_core::config::Config;
use ward_core::paths::WardPaths;
use ward_core::profiles::{self, GateMode};
use ward_core::ratelimit::RateLimiter;
use ward_core::router::Router;
use ward_core::sideband;
use ward_core::state::{SessionState, StateStore};
use ward_core::telemetry::{EventBus, GateTimings, Metrics};
use ward_gates::GateContext;
use ward_types::{Escalation, EventType, GateResult, HookPayload, Severity, Tier};

/// The synchronous enforcement pipeline: one instance per invocation.
///
/// PreToolUse: route → (breaker, profile, cache) → timed gate checks →
/// first block/ask short-circuits → decision + sideband. PostToolUse:
/// post-interested gates, the observation compressor, then the tracker
/// merge; results never affect the exit code because the tool already
/// ran.
pub struct Pipeline {
    paths: WardPaths,
    config: Config,
    clock: Box<dyn Clock>,
    store: StateStore,
    router: Router,
    breaker: CircuitBreaker,
    cache: ResultCache,
    limiter: RateLimiter,
    metrics: Metrics,
    bus: EventBus,
    timings: GateTimings,
    audit: AuditLog,
    queue: CaptureQueue,
    tracker: Tracker,
}

impl Pipeline {
    pub fn new(paths: WardPaths, config: Config) -> Result<Self> {
        Self::with_clock(paths, config, Box::new(SystemClock))
    }

    pub fn with_clock(paths: WardPaths, config: Config, clock: Box<dyn Clock>) -> Result<Self> {
        // A registry/gate-set mismatch is a deployment bug; surface it
        // before any tool call is evaluated.
        ward_core::validate(&ward_gates::all_gate_ids())?;

        Ok(Pipeline {
            store: StateStore::new(paths.clone()),
            router: Router::load(&paths),
            breaker: CircuitBreaker::new(paths.circuits_file(), BreakerConfig::gates()),
            cache: ResultCache::new(config.cache_enabled),
            limiter: RateLimiter::new(),
            metrics: Metrics::new(),
            bus: EventBus::default(),
            timings: GateTimings::load(&paths),
            audit: AuditLog::new(paths.clone(), config.audit_trail_cap),
            queue: CaptureQueue::new(paths.clone(), config.capture_queue_cap),
            tracker: Tracker::new(paths.clone()),
            clock,
            config,
            paths,
        })
    }

    /// Handle one host invocation end to end and say what to emit.
    pub fn run(&mut self, payload: &HookPayload) -> Emission {
        let now = self.clock.epoch_secs();
        let session_id = payload.session_id.clone();
        let mut state = self.store.load(&session_id, now);
        let baseline = state.clone();

        self.limiter
            .consume(&format!("tool:{}", payload.tool_name), 1.0, now);

        // The tracker half of a PostToolUse invocation folds the
        // enforcer's pending patch in first, so post gates see the
        // freshest state.
        if payload.event_type == EventType::PostToolUse
            && let Err(err) = self.tracker.fold_sideband(&session_id, &mut state, now)
        {
            eprintln!("ward: sideband merge failed for {session_id}: {err}");
        }

        let final_result = self.run_gates(payload, &mut state, now);

        let emission = match payload.event_type {
            EventType::PreToolUse => {
                let patch = state.diff(&baseline);
                if let Err(err) = sideband::write_sideband(&self.paths, &session_id, &patch) {
                    // Tolerated: the tracker just sees no patch.
                    eprintln!("ward: sideband write failed for {session_id}: {err}");
                }
                final_result
                    .as_ref()
                    .map(Emission::from_result)
                    .unwrap_or_else(Emission::allow)
            }
            EventType::PostToolUse => {
                let observation = compress_observation(
                    &payload.tool_name,
                    &payload.tool_input,
                    payload.tool_response.as_ref(),
                    &session_id,
                    self.clock.now_wall(),
                );
                if let Err(err) = self.queue.enqueue(&observation) {
                    eprintln!("ward: observation not queued: {err}");
                }

                self.tracker.record_post_event(payload, &mut state, now);
                if let Err(err) = self.tracker.save(&session_id, &mut state, now) {
                    eprintln!("ward: state save failed for {session_id}: {err}");
                }
                Emission::allow()
            }
        };

        if let Err(err) = self.router.flush() {
            eprintln!("ward: q-table not flushed: {err}");
        }
        if let Err(err) = self.timings.flush() {
            eprintln!("ward: gate timings not flushed: {err}");
        }
        emission
    }

    /// Run the routed gates in order; the first block or ask on
    /// PreToolUse short-circuits and is returned.
    fn run_gates(
        &mut self,
        payload: &HookPayload,
        state: &mut SessionState,
        now: f64,
    ) -> Option<GateResult> {
        let tool = payload.tool_name.as_str();
        let profile = profiles::profile_for(state);
        let order = self.router.order(tool, profile);

        for spec in order {
            if self.breaker.should_skip(spec.id, spec.tier, now) {
                self.metrics.incr("gate.skip");
                self.bus.emit(now, "gate.skip", json!({"gate": spec.id}));
                continue;
            }
            let mode = profiles::gate_mode(profile, spec.id);
            if mode == GateMode::Disabled {
                continue;
            }
            let Some(gate) = ward_gates::build(spec.id) else {
                continue;
            };
            if payload.event_type == EventType::PostToolUse && !gate.runs_on_post() {
                continue;
            }

            let cached = if payload.event_type == EventType::PreToolUse {
                self.cache.get(spec.id, tool, &payload.tool_input, now)
            } else {
                None
            };
            if cached.is_some() {
                self.metrics.incr("cache.hit");
            }

            let mut result = match cached {
                Some(result) => result,
                None => {
                    if !self.limiter.consume(&format!("gate:{}", spec.id), 1.0, now) {
                        self.metrics.incr("gate.rate_limited");
                        continue;
                    }
                    let ctx = GateContext {
                        tool,
                        input: &payload.tool_input,
                        event: payload.event_type,
                        session_id: &payload.session_id,
                        now,
                        paths: &self.paths,
                    };
                    let started = Instant::now();
                    match gate.check(&ctx, state) {
                        Err(err) => {
                            // Fail open: for Tier 1 too, a crashed gate's
                            // effect is allow, never block on an
                            // implementation bug.
                            self.breaker.record_result(spec.id, spec.tier, false, now);
                            self.metrics.incr("gate.crash");
                            self.bus.emit(
                                now,
                                "gate.crash",
                                json!({"gate": spec.id, "error": err.to_string()}),
                            );
                            eprintln!("ward: {} crashed: {err}", spec.id);
                            continue;
                        }
                        Ok(mut checked) => {
                            let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;
                            checked.duration_ms = Some(elapsed_ms);
                            // A deadline overrun counts as a crash for
                            // the breaker, but the result still stands.
                            let on_time = elapsed_ms <= self.config.gate_deadline_ms;
                            self.breaker.record_result(spec.id, spec.tier, on_time, now);
                            if !on_time {
                                self.metrics.incr("gate.deadline_exceeded");
                            }
                            self.cache.put(
                                spec.id,
                                tool,
                                &payload.tool_input,
                                &checked,
                                payload.event_type,
                                now,
                            );
                            checked
                        }
                    }
                }
            };

            if result.blocked && spec.tier != Tier::One && mode == GateMode::Warn {
                result.blocked = false;
                result.escalation = Escalation::Warn;
                if result.severity == Severity::Error {
                    result.severity = Severity::Warn;
                }
            }

            let duration = result.duration_ms.unwrap_or(0.0);
            state.record_timing(spec.id, duration);
            self.timings.record(spec.id, duration);
            self.metrics.observe("gate.duration_ms", duration);

            if result.blocked {
                self.router.record_block(spec.id, tool);
            } else {
                self.router.record_pass(spec.id, tool);
            }

            if let Err(err) =
                self.audit
                    .append(spec.id, tool, &result, &payload.session_id, self.clock.now_wall())
            {
                eprintln!("ward: audit append failed: {err}");
            }

            if payload.event_type == EventType::PreToolUse && (result.blocked || result.is_ask()) {
                return Some(result);
            }
        }
        None
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn cache_stats(&self) -> ward_core::cache::CacheStats {
        self.cache.stats()
    }
}
