//! Generation presentation: plot and episode runs, dry runs and progress lines.

use super::shared::{format_elapsed, format_section_heading, format_usage, ok_mark};
use crate::workflow::{EpisodeBatchReport, EpisodeOutcome, EpisodePlan, PlotPlan, PlotRun};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

const PLOT_EXCERPT_CHARS: usize = 40;

pub fn format_plot_plan(plan: &PlotPlan) -> String {
    let mut out = format!("{}\n", "Dry run: the provider is not called".yellow());
    out.push_str(&format!("Title: {}\n", plan.title));
    match &plan.arc {
        Some(arc) => out.push_str(&format!("Target: arc '{}' (merged into plot.json)\n", arc)),
        None => out.push_str("Target: whole plot (replaces plot.json)\n"),
    }
    out.push_str(&format!(
        "Settings: {} chars{}\n",
        plan.setting_chars,
        if plan.has_character { " (setting.md + character.md)" } else { " (setting.md)" }
    ));
    if !plan.existing_arcs.is_empty() {
        out.push_str(&format!("Existing arcs: {}\n", plan.existing_arcs.join(", ")));
    }
    out.push_str(&format!("\n{}", plan.setting_excerpt.dimmed()));
    out
}

pub fn format_plot_run(run: &PlotRun) -> String {
    let mut out = match &run.arc {
        Some(arc) => format!(
            "{} Arc '{}' generated and merged into {}/plot.json\n",
            ok_mark(),
            arc,
            run.title
        ),
        None => format!("{} Plot generated: {}/plot.json\n", ok_mark(), run.title),
    };

    out.push_str(&format!("\n{}\n", format_section_heading("Plot")));
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Arc", "Episodes"]);
    for arc in run.plot.arcs() {
        table.add_row(vec![arc.name.clone(), arc.episode_count().to_string()]);
    }
    out.push_str(&format!("{}\n\n", table));
    out.push_str(&format!(
        "Elapsed: {}\n{}",
        format_elapsed(run.elapsed_ms),
        format_usage(&run.usage)
    ));
    out
}

pub fn format_episode_plan(plan: &EpisodePlan) -> String {
    let mut out = format!("{}\n", "Dry run: the provider is not called".yellow());
    out.push_str(&format!(
        "Title: {}\nArc: {}\nSettings: {} chars{}\n\n",
        plan.title,
        plan.arc,
        plan.setting_chars,
        if plan.has_character { " (with character.md)" } else { "" }
    ));

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Episode", "Action", "Plot"]);
    for planned in &plan.episodes {
        let action = match (planned.exists, plan.force) {
            (false, _) => "generate",
            (true, true) => "overwrite",
            (true, false) => "skip (exists)",
        };
        table.add_row(vec![
            planned.episode.to_string(),
            action.to_string(),
            crate::workflow::excerpt(&planned.plot, PLOT_EXCERPT_CHARS),
        ]);
    }
    out.push_str(&table.to_string());
    out.push_str(&format!(
        "\n\n{} of {} episode(s) would be generated",
        plan.pending().count(),
        plan.episodes.len()
    ));
    out
}

/// Progress line printed while a batch runs.
pub fn format_episode_outcome(arc: &str, outcome: &EpisodeOutcome) -> String {
    match outcome {
        EpisodeOutcome::Written { episode, path, chars } => format!(
            "{} {} episode {} written ({} chars): {}",
            ok_mark(),
            arc,
            episode,
            chars,
            path.display()
        ),
        EpisodeOutcome::Skipped { episode } => format!(
            "{} {} episode {} exists, skipped (use --force to overwrite)",
            "-".yellow(),
            arc,
            episode
        ),
    }
}

pub fn format_episode_report(report: &EpisodeBatchReport) -> String {
    let mut out = format!(
        "{} {} / {}: {} written, {} skipped\n",
        ok_mark(),
        report.title,
        report.arc,
        report.written(),
        report.skipped()
    );
    out.push_str(&format!(
        "Elapsed: {}\n{}",
        format_elapsed(report.elapsed_ms),
        format_usage(&report.usage)
    ));
    out
}
