use hourglass_quota::QuotaEngine;
use serde::Serialize;

use crate::OutputFormat;

#[derive(Debug, Serialize)]
struct LimitsReport<'a> {
    limits: Vec<(&'a str, i64)>,
    resets_in_secs: u64,
}

pub fn run(engine: &QuotaEngine, format: &OutputFormat) -> anyhow::Result<()> {
    let mut limits: Vec<(&str, i64)> = engine.limits().iter().collect();
    limits.sort_unstable();
    let resets_in = engine.time_until_reset();

    match format {
        OutputFormat::Json => {
            let report = LimitsReport {
                limits,
                resets_in_secs: resets_in.as_secs(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{} features:", limits.len());
            for (feature, limit) in &limits {
                println!("  {feature}: {limit}/day");
            }
            let secs = resets_in.as_secs();
            println!(
                "Counters reset in {}h{:02}m (00:00 UTC).",
                secs / 3600,
                (secs % 3600) / 60
            );
        }
    }
    Ok(())
}
