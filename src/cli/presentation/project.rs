//! Project presentation: init, list and status.

use super::shared::{format_section_heading, missing_mark, ok_mark, optional_mark, to_pretty_json};
use crate::error::ApiError;
use crate::store::{InitOutcome, PlotState, ProjectStatus};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

pub fn format_init_summary(title: &str, outcome: &InitOutcome) -> String {
    let setting = outcome.project_dir.join("setting.md");
    let mut out = format!(
        "{} Novel project '{}' initialized at {}\n",
        ok_mark(),
        title,
        outcome.project_dir.display()
    );
    if outcome.setting_created {
        out.push_str(&format!("  Created {}\n", setting.display()));
    } else {
        out.push_str(&format!("  Kept existing {}\n", setting.display()));
    }
    out.push_str(&format!(
        "\nNext: edit {} and run 'yumechain generate-plot --title {}'",
        setting.display(),
        title
    ));
    out
}

pub fn format_project_list(titles: &[String]) -> String {
    if titles.is_empty() {
        return "No novel projects found.\n\nUse 'yumechain init --title <title>' to create one."
            .to_string();
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["No.", "Title"]);
    for (i, title) in titles.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), title.clone()]);
    }
    format!("{}\n\nTotal: {} project(s)", table, titles.len())
}

pub fn format_status_text(status: &ProjectStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n",
        format_section_heading(&format!("Novel project: {}", status.title))
    ));
    out.push_str(&format!("Directory: {}\n\n", status.project_dir.display()));

    if status.has_setting {
        out.push_str(&format!("{} setting.md exists\n", ok_mark()));
    } else {
        out.push_str(&format!("{} setting.md missing\n", missing_mark()));
    }
    if status.has_character {
        out.push_str(&format!("{} character.md exists\n", ok_mark()));
    } else {
        out.push_str(&format!("{} character.md missing (optional)\n", optional_mark()));
    }

    match &status.plot {
        PlotState::Missing => out.push_str(&format!("{} plot.json missing\n", missing_mark())),
        PlotState::Corrupted { message } => {
            out.push_str(&format!("{} plot.json unreadable\n", missing_mark()));
            out.push_str(&format!("  {}\n", message.red()));
        }
        PlotState::Ready { arcs } => {
            let planned: usize = arcs.iter().map(|a| a.episodes).sum();
            out.push_str(&format!(
                "{} plot.json exists: {} arcs, {} episodes planned\n",
                ok_mark(),
                arcs.len(),
                planned
            ));
            if !arcs.is_empty() {
                let mut table = Table::new();
                table.load_preset(UTF8_BORDERS_ONLY);
                table.set_header(vec!["Arc", "Planned", "Written"]);
                for arc in arcs {
                    table.add_row(vec![
                        arc.name.clone(),
                        arc.episodes.to_string(),
                        arc.written.to_string(),
                    ]);
                }
                out.push_str(&format!("\n{}\n\n", table));
            }
        }
    }

    out.push_str(&format!(
        "{} stories/ with {} episode file(s)",
        ok_mark(),
        status.story_count
    ));
    out
}

pub fn format_status_json(status: &ProjectStatus) -> Result<String, ApiError> {
    to_pretty_json(status)
}
