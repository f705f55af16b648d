//! CLI presentation: text and json formatters per command family.

mod generation;
mod project;
mod provider;
mod publish;
mod shared;

pub use generation::{
    format_episode_outcome, format_episode_plan, format_episode_report, format_plot_plan,
    format_plot_run,
};
pub use project::{
    format_init_summary, format_project_list, format_status_json, format_status_text,
};
pub use provider::{
    format_model_list, format_provider_show_json, format_provider_show_text,
};
pub use publish::{
    format_publish_confirmation, format_published, format_publish_preview, format_story_list,
};
pub use shared::{format_section_heading, format_usage};
