use crate::{Gate, GateContext, GateError};
use std::path::Path;
use ward_core::state::SessionState;
use ward_types::{EventType, GateResult, Severity};

pub const ID: &str = "gate_01_read_before_edit";

/// Tier 1: no editing a file this session has never read.
///
/// Writes that create a brand-new file are exempt; overwriting an
/// existing file is an edit like any other.
pub struct ReadBeforeEdit;

impl Gate for ReadBeforeEdit {
    fn id(&self) -> &'static str {
        ID
    }

    fn check(
        &self,
        ctx: &GateContext<'_>,
        state: &mut SessionState,
    ) -> Result<GateResult, GateError> {
        if ctx.event == EventType::PostToolUse {
            return Ok(GateResult::pass(ID));
        }
        let file_path = ctx.input_str("file_path");
        if file_path.is_empty() {
            return Ok(GateResult::pass(ID));
        }
        if ctx.tool == "Write" && !Path::new(file_path).exists() {
            return Ok(GateResult::pass(ID));
        }
        if state.has_read(file_path) {
            return Ok(GateResult::pass(ID));
        }

        let message = format!(
            "{file_path} has not been read this session. Read the file before editing it."
        );
        state.record_block_outcome(ID, ctx.tool, "unread file", ctx.now);
        Ok(GateResult::block(ID, message).with_severity(Severity::Error))
    }
}
