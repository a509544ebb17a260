//! List the resolved MRPE entries
//! Usage: mrpe entries [--json]

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::entry::CheckEntry;

pub fn execute(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (_, provider) = super::load_provider(config_path)?;

    if json {
        let out = serde_json::to_string_pretty(provider.entries())
            .context("Failed to serialize entries to JSON")?;
        println!("{out}");
        return Ok(());
    }

    println!("{}", "MRPE entries".bold());
    println!("{}", "─".repeat(50).dimmed());
    if provider.entries().is_empty() {
        println!("(no entries)");
    }
    for entry in provider.entries() {
        println!("{}", describe(entry));
    }
    println!(
        "{} checks, {} includes, {} entries",
        provider.checks().len(),
        provider.includes().len(),
        provider.entries().len()
    );
    Ok(())
}

pub(crate) fn describe(entry: &CheckEntry) -> String {
    let mut line = format!("  {} {}", entry.description.bold(), entry.command_line);
    if let Some(policy) = entry.caching {
        let age = if policy.add_age { ", age shown" } else { "" };
        line.push_str(&format!(" {}", format!("[cached {}s{age}]", policy.max_age).cyan()));
    }
    if !entry.user.is_empty() {
        line.push_str(&format!(" {}", format!("as {}", entry.user).yellow()));
    }
    line
}
