//! Config loading facade: one entry point for every layered source.

use super::merge::merge_policy;
use super::sources::{environment, global_file, workspace_file};
use super::YumeConfig;
use config::{ConfigError, File};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Loads `YumeConfig` from layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Layers, lowest first: defaults, global file, workspace `config/config.toml`,
    /// workspace `config/{YUMECHAIN_ENV}.toml`, `YUMECHAIN__*` environment variables.
    /// The workspace `.env` is read first without overriding variables already set.
    pub fn load(workspace_root: &Path) -> Result<YumeConfig, ConfigError> {
        Self::load_dotenv(workspace_root);

        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }

    /// Load configuration from a single explicit file plus environment overrides.
    pub fn load_from_file(path: &Path) -> Result<YumeConfig, ConfigError> {
        if let Some(parent) = path.parent() {
            Self::load_dotenv(parent);
        }

        let builder = merge_policy::builder_with_defaults()?
            .add_source(File::from(path.to_path_buf()).required(true));
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }

    /// Path of the global user configuration file, when a config directory is known.
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }

    fn load_dotenv(dir: &Path) {
        let env_file = dir.join(".env");
        if env_file.exists() {
            match dotenvy::from_path(&env_file) {
                Ok(()) => debug!(path = %env_file.display(), "Loaded environment file"),
                Err(e) => debug!(path = %env_file.display(), error = %e, "Skipped environment file"),
            }
        }
    }
}

