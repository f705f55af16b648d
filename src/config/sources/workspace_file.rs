//! Workspace config files: `config/config.toml` overlaid by `config/{YUMECHAIN_ENV}.toml`.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Overlay used when `YUMECHAIN_ENV` is unset
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Overlay name from `YUMECHAIN_ENV`.
pub fn environment_name() -> String {
    environment_name_from(std::env::var("YUMECHAIN_ENV").ok())
}

/// Blank values fall back to the default. Names that would escape `config/` or shadow the
/// base file are ignored with a warning.
fn environment_name_from(raw: Option<String>) -> String {
    let Some(raw) = raw else {
        return DEFAULT_ENVIRONMENT.to_string();
    };
    let name = raw.trim();
    if name.is_empty() {
        return DEFAULT_ENVIRONMENT.to_string();
    }
    let plain = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if !plain || name == "config" {
        warn!(yumechain_env = %name, "Ignoring unusable YUMECHAIN_ENV, using {}", DEFAULT_ENVIRONMENT);
        return DEFAULT_ENVIRONMENT.to_string();
    }
    name.to_string()
}

/// Workspace config files that exist, lowest precedence first.
pub fn workspace_config_files(workspace_root: &Path, environment: &str) -> Vec<PathBuf> {
    let dir = workspace_root.join("config");
    [dir.join("config.toml"), dir.join(format!("{}.toml", environment))]
        .into_iter()
        .filter(|path| path.is_file())
        .collect()
}

pub fn add_to_builder(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let environment = environment_name();
    let files = workspace_config_files(workspace_root, &environment);
    if files.is_empty() {
        debug!(
            workspace = %workspace_root.display(),
            environment = %environment,
            "No workspace configuration files"
        );
    }
    for path in files {
        debug!(config_path = %path.display(), environment = %environment, "Using workspace configuration");
        builder = builder.add_source(File::from(path).required(true));
    }
    Ok(builder)
}
