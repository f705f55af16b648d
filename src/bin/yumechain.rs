//! YumeChain CLI Binary
//!
//! Command-line interface for generating novels with LLM providers.

use clap::Parser;
use std::process;
use tracing::{error, info};
use yumechain::cli::{Cli, RunContext};
use yumechain::config::ConfigLoader;
use yumechain::logging::{init_logging, LoggingConfig};
use yumechain::provider::{EnvSource, ProcessEnv};

fn main() {
    let cli = Cli::parse();

    // Build logging config from CLI args, env vars, and config file
    let logging_config = build_logging_config(&cli);

    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    info!("YumeChain CLI starting");

    let context = match RunContext::new(cli.workspace.clone(), cli.config.clone()) {
        Ok(ctx) => {
            info!("CLI context initialized");
            ctx
        }
        Err(e) => {
            error!("Error initializing workspace: {}", e);
            eprintln!("{}", yumechain::cli::map_error(&e));
            process::exit(1);
        }
    };

    let Some(command) = cli.command.as_ref() else {
        if let Err(e) = yumechain::cli::run_menu(&context) {
            error!("Interactive menu failed: {}", e);
            eprintln!("{}", yumechain::cli::map_error(&e));
            process::exit(1);
        }
        return;
    };

    match context.execute(command) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("{}", yumechain::cli::map_error(&e));
            process::exit(1);
        }
    }
}

/// Build logging configuration from CLI args, environment, and config file.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    build_logging_config_with(cli, &ProcessEnv)
}

/// Precedence: CLI flags > `YUMECHAIN_LOG*` env > config file > defaults.
fn build_logging_config_with(cli: &Cli, env: &dyn EnvSource) -> LoggingConfig {
    let mut config = if let Some(ref config_path) = cli.config {
        ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };
    config.apply_env(env);

    if cli.quiet {
        config.enabled = false;
    }
    if cli.verbose {
        config.level = "debug".to_string();
        // An explicit --log-output value still takes precedence below.
        if config.output == "file" {
            config.output = "file+stderr".to_string();
        }
    }
    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }

    let output_uses_file = config.output == "file" || config.output == "file+stderr";
    if config.enabled && output_uses_file {
        let resolved = yumechain::logging::resolve_log_file_path(
            cli.log_file.clone(),
            config.file.clone(),
            Some(cli.workspace.as_path()),
        );
        if let Ok(path) = resolved {
            config.file = Some(path);
        }
    } else if let Some(ref file) = cli.log_file {
        config.file = Some(file.clone());
    }

    config
}
