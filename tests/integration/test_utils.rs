//! Shared test utilities for integration tests
//!
//! Serializes access to process environment variables and builds LLM clients that talk to
//! a local mock server instead of a real provider.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;
use yumechain::config::LlmConfig;
use yumechain::llm::LlmClient;
use yumechain::provider::{resolve_settings, ProviderFactory, TaskKind};
use yumechain::store::{FsProjectStore, ProjectStore};

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

/// Variables a test may set; captured and restored around each guarded test
const GUARDED_VARS: [&str; 6] = [
    "HOME",
    "XDG_CONFIG_HOME",
    "YUMECHAIN_ENV",
    "YUMECHAIN__BOOKS_DIR",
    "YUMECHAIN__LLM__PROVIDER",
    "YUMECHAIN__READER__PORT",
];

struct EnvState {
    saved: Vec<(&'static str, Option<String>)>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            saved: GUARDED_VARS
                .iter()
                .map(|name| (*name, std::env::var(name).ok()))
                .collect(),
        }
    }

    fn restore(self) {
        for (name, value) in self.saved {
            match value {
                Some(value) => std::env::set_var(name, value),
                None => std::env::remove_var(name),
            }
        }
    }
}

/// Run `f` with an isolated config home and a clean `YUMECHAIN__*` environment.
///
/// `XDG_CONFIG_HOME` and `HOME` point into `test_dir`, so no real user config leaks in.
/// The original environment is restored afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    for name in GUARDED_VARS {
        std::env::remove_var(name);
    }
    let config_home = test_dir.path().join("xdg");
    let home = test_dir.path().join("home");
    std::fs::create_dir_all(&config_home).unwrap();
    std::fs::create_dir_all(&home).unwrap();
    std::env::set_var("HOME", home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", config_home.to_str().unwrap());

    let result = f();

    env_state.restore();

    result
}

/// A store under `<dir>/books` with one project whose setting is `setting`.
pub fn store_with_project(dir: &Path, title: &str, setting: &str) -> FsProjectStore {
    let store = FsProjectStore::new(dir.join("books"));
    let outcome = store.create_project(title).unwrap();
    std::fs::write(outcome.project_dir.join("setting.md"), setting).unwrap();
    store
}

/// An LLM client resolved from `llm` and the given variables, pointed at `base_url`.
pub fn llm_client(
    mut llm: LlmConfig,
    task: TaskKind,
    vars: &[(&str, &str)],
    base_url: &str,
) -> LlmClient {
    llm.endpoint = Some(base_url.to_string());
    let env: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let settings = resolve_settings(&llm, task, &env).unwrap();
    let client = ProviderFactory::create_client(&settings).unwrap();
    LlmClient::new(client, settings)
}
