//! CLI domain: parse, route, help, output, menu and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod help;
mod menu;
mod output;
mod parse;
mod presentation;
mod route;

pub use help::{calls_provider, command_name};
pub use menu::run_menu;
pub use output::{error_hint, map_error};
pub use parse::{Cli, Commands, ProviderCommands};
pub use presentation::{
    format_episode_outcome, format_episode_plan, format_episode_report, format_init_summary,
    format_model_list, format_plot_plan, format_plot_run, format_project_list,
    format_provider_show_json, format_provider_show_text, format_publish_confirmation,
    format_publish_preview, format_published, format_section_heading, format_status_json,
    format_status_text, format_story_list, format_usage,
};
pub use route::RunContext;
