use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use reporting::{json, timeline};

pub fn execute(input: &Path, json: bool, show_timeline: bool) -> Result<()> {
    let contents =
        fs::read_to_string(input).with_context(|| format!("read report {}", input.display()))?;
    let report = json::parse_report(&contents).context("parse report JSON")?;

    if json {
        println!("{}", contents);
        return Ok(());
    }
    println!("{}", report.human_summary());
    if show_timeline {
        for line in timeline::timeline(&report.events) {
            println!("  {line}");
        }
    }
    Ok(())
}
