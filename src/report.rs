use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::dashboard::Snapshot;
use crate::models::PipelineEntry;
use crate::summary;

pub fn summarize_stages(pipeline: &[PipelineEntry]) -> Vec<(String, usize)> {
    let mut map: HashMap<String, usize> = HashMap::new();

    for entry in pipeline {
        *map.entry(entry.stage.clone()).or_insert(0) += 1;
    }

    let mut stages: Vec<(String, usize)> = map.into_iter().collect();
    stages.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stages
}

pub fn format_amount(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::new();

    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

pub fn build_report(snapshot: &Snapshot, now: DateTime<Utc>, window_days: i64) -> String {
    let stats = &snapshot.summary;
    let status_mix = summary::count_by_status(&snapshot.grants);
    let upcoming = summary::upcoming_deadlines(&snapshot.grants, now, window_days);
    let stages = summarize_stages(&snapshot.pipeline);

    let mut output = String::new();

    let _ = writeln!(output, "# Grant Pipeline Report");
    let _ = writeln!(output, "Generated {}", now.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Grants tracked: {}", stats.total_grants);
    let _ = writeln!(output, "- Active applications: {}", stats.active_applications);
    let _ = writeln!(output, "- Requested: {}", format_amount(stats.total_requested));
    let _ = writeln!(output, "- Awarded: {}", format_amount(stats.total_awarded));
    let _ = writeln!(
        output,
        "- Success rate: {:.1}% ({} of {} decided)",
        stats.success_rate, stats.awarded_count, stats.decided_count
    );
    let _ = writeln!(
        output,
        "- Deadlines in the next 30 days: {}",
        stats.upcoming_deadlines
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if status_mix.is_empty() {
        let _ = writeln!(output, "No grants tracked yet.");
    } else {
        for entry in status_mix.iter() {
            let _ = writeln!(output, "- {}: {}", entry.status, entry.count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Upcoming Deadlines ({window_days} days)");

    if upcoming.is_empty() {
        let _ = writeln!(output, "No deadlines in this window.");
    } else {
        for grant in upcoming.iter().take(10) {
            if let Some(deadline) = grant.deadline_date {
                let _ = writeln!(
                    output,
                    "- {} ({}, {}) due {} [{}]",
                    grant.title, grant.funder, grant.status, deadline, grant.priority
                );
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Pipeline Stages");

    if stages.is_empty() {
        let _ = writeln!(output, "No pipeline activity recorded.");
    } else {
        for (stage, count) in stages.iter() {
            let _ = writeln!(output, "- {stage}: {count}");
        }
    }

    let mut open_milestones: Vec<_> = snapshot
        .progress
        .iter()
        .filter(|entry| entry.completed_at.is_none())
        .collect();
    open_milestones.sort_by_key(|entry| entry.due_date);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Open Milestones");

    if open_milestones.is_empty() {
        let _ = writeln!(output, "All tracked milestones are complete.");
    } else {
        for entry in open_milestones.iter().take(5) {
            let due = entry
                .due_date
                .map(|date| date.to_string())
                .unwrap_or_else(|| "no due date".to_string());
            let _ = writeln!(
                output,
                "- {} at {}% ({})",
                entry.milestone, entry.percent_complete, due
            );
        }
    }

    output
}
