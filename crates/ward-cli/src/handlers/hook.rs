use std::io::Read;
use ward_core::config::Config;
use ward_core::paths::WardPaths;
use ward_runtime::Pipeline;
use ward_types::HookPayload;

// NOTE: Fail-open discipline
//
// This handler never returns a framework error. Malformed stdin, a
// registry mismatch, a corrupt state file: every internal failure
// becomes "allow" (exit 0) with a diagnostic on stderr. The only path
// to exit 2 is a gate that ran to completion and blocked.

/// Evaluate one hook invocation from stdin. Returns the exit code.
pub fn run(paths: WardPaths, config: Config) -> i32 {
    let mut raw = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut raw) {
        eprintln!("ward: could not read stdin ({err}); allowing");
        return 0;
    }

    let payload = match HookPayload::from_str(&raw) {
        Ok(payload) => payload,
        Err(err) => {
            eprintln!("ward: {err}; allowing");
            return 0;
        }
    };

    let mut pipeline = match Pipeline::new(paths, config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            eprintln!("ward: pipeline unavailable ({err}); allowing");
            return 0;
        }
    };

    let emission = pipeline.run(&payload);
    if let Some(stdout) = emission.stdout {
        println!("{stdout}");
    }
    emission.exit_code
}
