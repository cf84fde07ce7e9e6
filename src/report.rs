//! Output formatting for the `pdesk` commands.

use peopledesk_core::maintenance::RebuildReport;
use peopledesk_core::models::MaintenanceRun;
use peopledesk_core::MaintenanceError;

/// Human or JSON rendering of a rebuild report.
pub fn render_report(report: &RebuildReport, json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(report)?);
    }
    let prefix = if report.dry_run { "[dry run] " } else { "" };
    if report.summary.is_noop() {
        Ok(format!(
            "{}{}: no changes ({} unchanged)",
            prefix, report.projection, report.summary.unchanged
        ))
    } else {
        Ok(format!("{}{}: {}", prefix, report.projection, report.summary))
    }
}

pub fn render_runs(runs: &[MaintenanceRun], json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(runs)?);
    }
    if runs.is_empty() {
        return Ok("no maintenance runs recorded".to_string());
    }
    let lines: Vec<String> = runs
        .iter()
        .map(|run| {
            format!(
                "{}  {:<20} {}",
                run.finished_at.format("%Y-%m-%d %H:%M:%S"),
                run.projection,
                run.summary
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

/// Exit code for a failed command: the maintenance taxonomy decides when it
/// applies, everything else is a plain failure.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<MaintenanceError>()
        .map(MaintenanceError::exit_code)
        .unwrap_or(1)
}
