//! Text summaries for CLI output.
//!
//! Formats run records and scene contents as human-readable lines for text mode.

use g4dash::model::{RunRecord, RunStatus};
use g4dash::scene::Surface;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Summary of one run record.
pub(crate) fn build_run_summary(record: &RunRecord) -> TextSummary {
    let mut lines = Vec::new();

    if let Some(run_id) = record.run_id.as_deref() {
        lines.push(format!("Run: {run_id}"));
    }
    lines.push(format!("Status: {}", record.status));
    lines.push(format!("Geometry: {}", record.geometry));
    lines.push(format!(
        "Beam: {} {} at {} towards {}",
        record.particle, record.energy, record.position, record.direction
    ));
    lines.push(format!("Events: {}", record.n_events));
    lines.push(format!("Output: {}", record.output_file));
    match record.finished.as_deref() {
        Some(finished) => lines.push(format!("Started/finished: {} / {}", record.started, finished)),
        None => lines.push(format!("Started: {}", record.started)),
    }

    TextSummary { lines }
}

/// One line per run, newest first as given.
pub(crate) fn build_history(records: &[RunRecord]) -> TextSummary {
    if records.is_empty() {
        return TextSummary {
            lines: vec!["No runs recorded.".to_string()],
        };
    }
    let lines = records
        .iter()
        .map(|r| {
            let marker = match r.status {
                RunStatus::Completed => ' ',
                RunStatus::Running => '*',
                RunStatus::Failed { .. } => '!',
            };
            format!(
                "{marker} {:<18} {:<16} {:>9} evts  {:<12} {}",
                r.run_id.as_deref().unwrap_or("-"),
                r.status.to_string(),
                r.n_events,
                r.particle,
                r.geometry
            )
        })
        .collect();
    TextSummary { lines }
}

/// One line per surface: name, size and colour.
pub(crate) fn build_scene_summary(surfaces: &[Surface]) -> TextSummary {
    let mut lines: Vec<String> = surfaces
        .iter()
        .map(|s| {
            format!(
                "{:<24} {:>6} verts {:>6} tris  {}",
                s.name,
                s.mesh.vertex_count(),
                s.mesh.triangle_count(),
                s.color
            )
        })
        .collect();
    lines.push(format!("{} surfaces", surfaces.len()));
    TextSummary { lines }
}
