//! CLI help and command-name contract for logging and routing.

use crate::cli::parse::{Commands, ProviderCommands};

/// Command name string for log spans (e.g. "generate_episode", "provider.show").
pub fn command_name(command: &Commands) -> String {
    match command {
        Commands::Init { .. } => "init".to_string(),
        Commands::List => "list".to_string(),
        Commands::Status { .. } => "status".to_string(),
        Commands::GeneratePlot { .. } => "generate_plot".to_string(),
        Commands::GenerateEpisode { .. } => "generate_episode".to_string(),
        Commands::Read { .. } => "read".to_string(),
        Commands::Publish { .. } => "publish".to_string(),
        Commands::Provider { command } => format!("provider.{}", provider_command_name(command)),
    }
}

pub fn provider_command_name(command: &ProviderCommands) -> &'static str {
    match command {
        ProviderCommands::Show { .. } => "show",
        ProviderCommands::Models { .. } => "models",
    }
}

/// Whether the command talks to an LLM provider.
pub fn calls_provider(command: &Commands) -> bool {
    match command {
        Commands::GeneratePlot { dry_run, .. } | Commands::GenerateEpisode { dry_run, .. } => {
            !dry_run
        }
        Commands::Provider {
            command: ProviderCommands::Models { .. },
        } => true,
        _ => false,
    }
}
