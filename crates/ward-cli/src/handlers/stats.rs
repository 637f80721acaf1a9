use crate::args::OutputFormat;
use anyhow::Result;
use chrono::Utc;
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use serde_json::{Value, json};
use ward_core::fsio;
use ward_core::paths::WardPaths;

fn count_lines(path: &std::path::Path) -> usize {
    std::fs::read_to_string(path)
        .map(|content| content.lines().count())
        .unwrap_or(0)
}

fn gather(paths: &WardPaths) -> Value {
    let memory_worker = match ward_runtime::MemoryClient::new(paths.clone()).ping() {
        Ok(_) => "up",
        Err(_) => "down",
    };

    let circuits = fsio::read_json_lenient(&paths.circuits_file()).unwrap_or(json!({}));
    let open_circuits: Vec<&String> = circuits
        .as_object()
        .map(|records| {
            records
                .iter()
                .filter(|(_, record)| record["state"] == "OPEN")
                .map(|(gate, _)| gate)
                .collect()
        })
        .unwrap_or_default();

    let timings = fsio::read_json_lenient(&paths.timings_file()).unwrap_or(json!({}));

    let today = paths
        .audit_dir()
        .join(format!("{}.jsonl", Utc::now().format("%Y-%m-%d")));

    json!({
        "memory_worker": memory_worker,
        "circuits": {
            "tracked": circuits.as_object().map(|o| o.len()).unwrap_or(0),
            "open": open_circuits,
        },
        "gate_timings": timings,
        "audit_today": count_lines(&today),
        "audit_trail": count_lines(&paths.audit_dir().join("trail.jsonl")),
        "capture_queue_depth": count_lines(&paths.capture_queue_file()),
        "sessions_on_disk": std::fs::read_dir(paths.state_dir())
            .map(|entries| entries.filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
                .count())
            .unwrap_or(0),
    })
}

/// Summarize what the on-disk telemetry says about recent enforcement.
pub fn run(paths: &WardPaths, format: OutputFormat) -> Result<i32> {
    let stats = gather(paths);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => {
            let color = std::io::stdout().is_terminal();
            let heading = |text: &str| {
                if color {
                    println!("{}", text.bold());
                } else {
                    println!("{text}");
                }
            };

            heading("ward status");
            println!("  root: {}", paths.root().display());
            println!("  sessions on disk: {}", stats["sessions_on_disk"]);
            println!(
                "  audit entries today: {} (trail: {})",
                stats["audit_today"], stats["audit_trail"]
            );
            println!("  capture queue depth: {}", stats["capture_queue_depth"]);
            println!(
                "  memory worker: {}",
                stats["memory_worker"].as_str().unwrap_or("unknown")
            );

            heading("circuits");
            let open = stats["circuits"]["open"].as_array();
            match open {
                Some(gates) if !gates.is_empty() => {
                    for gate in gates {
                        let line = format!("  OPEN: {}", gate.as_str().unwrap_or("?"));
                        if color {
                            println!("{}", line.red());
                        } else {
                            println!("{line}");
                        }
                    }
                }
                _ => println!("  all closed"),
            }

            heading("slowest gates");
            let mut rows: Vec<(String, f64, u64)> = stats["gate_timings"]
                .as_object()
                .map(|timings| {
                    timings
                        .iter()
                        .filter_map(|(gate, stat)| {
                            let count = stat["count"].as_u64()?;
                            let total = stat["total_ms"].as_f64()?;
                            if count == 0 {
                                return None;
                            }
                            Some((gate.clone(), total / count as f64, count))
                        })
                        .collect()
                })
                .unwrap_or_default();
            rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            for (gate, mean, count) in rows.iter().take(5) {
                println!("  {gate}: {mean:.2}ms mean over {count} run(s)");
            }
            if rows.is_empty() {
                println!("  no timing data yet");
            }
        }
    }
    Ok(0)
}
