use crate::{Gate, GateContext, GateError};
use serde_json::json;
use sha2::{Digest, Sha256};
use ward_core::state::SessionState;
use ward_types::{GateResult, Severity};

pub const ID: &str = "gate_18_canary";

/// Identical consecutive calls before the repeat warning fires.
const REPEAT_THRESHOLD: usize = 5;

/// Long-window sampling keeps one timestamp per this many seconds.
const LONG_SAMPLE_S: f64 = 60.0;

const CANARY_LOG_CAP: usize = 2_000;

/// Universal behavioral canary. Never blocks; it watches the shape of
/// the session (tool mix, input sizes, repetition) and surfaces
/// anomalies as warnings plus a telemetry line.
pub struct Canary;

fn call_fingerprint(tool: &str, input: &serde_json::Value) -> String {
    let digest = Sha256::digest(format!("{tool}|{input}").as_bytes());
    let mut hex = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

impl Gate for Canary {
    fn id(&self) -> &'static str {
        ID
    }

    fn runs_on_post(&self) -> bool {
        true
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        let mut anomalies: Vec<String> = Vec::new();

        let had_calls = state.canary_total_calls > 0;
        state.canary_total_calls += 1;
        *state
            .canary_tool_counts
            .entry(ctx.tool.to_string())
            .or_insert(0) += 1;

        if !state.canary_seen_tools.iter().any(|t| t == ctx.tool) {
            state.canary_seen_tools.push(ctx.tool.to_string());
            if had_calls {
                anomalies.push(format!("new tool: {}", ctx.tool));
            }
        }

        let fingerprint = call_fingerprint(ctx.tool, ctx.input);
        state.canary_recent_seq.push(fingerprint.clone());
        if state.canary_recent_seq.len() > 10 {
            let overflow = state.canary_recent_seq.len() - 10;
            state.canary_recent_seq.drain(..overflow);
        }
        let repeats = state
            .canary_recent_seq
            .iter()
            .rev()
            .take_while(|fp| **fp == fingerprint)
            .count();
        if repeats >= REPEAT_THRESHOLD {
            anomalies.push(format!("repeated identical call x{repeats}"));
        }

        let input_size = ctx.input.to_string().len() as f64;
        let n = state.canary_total_calls as f64;
        state.canary_size_mean += (input_size - state.canary_size_mean) / n;

        state.canary_short_timestamps.push(ctx.now);
        let sample_due = state
            .canary_long_timestamps
            .last()
            .map(|last| ctx.now - *last >= LONG_SAMPLE_S)
            .unwrap_or(true);
        if sample_due {
            state.canary_long_timestamps.push(ctx.now);
        }

        let log_line = json!({
            "tool": ctx.tool,
            "ts": ctx.now,
            "total_calls": state.canary_total_calls,
            "unique_tools": state.canary_seen_tools.len(),
            "avg_input_size": state.canary_size_mean,
            "anomalies": anomalies,
        });
        // Telemetry only; a full disk must not fail the pipeline.
        let _ = ward_core::fsio::append_jsonl_capped(
            &ctx.paths.canary_log_file(),
            &log_line,
            CANARY_LOG_CAP,
        );

        if anomalies.is_empty() {
            Ok(GateResult::pass(ID))
        } else {
            let mut result = GateResult::warn(ID, anomalies.join("; "));
            result.severity = Severity::Warn;
            Ok(result)
        }
    }
}
