//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::cli::parse::{Commands, ProviderCommands};
use crate::cli::presentation::{
    format_episode_outcome, format_episode_plan, format_episode_report, format_init_summary,
    format_model_list, format_plot_plan, format_plot_run, format_project_list,
    format_provider_show_json, format_provider_show_text, format_publish_confirmation,
    format_publish_preview, format_published, format_status_json, format_status_text,
    format_story_list,
};
use crate::cli::command_name;
use crate::config::{ConfigLoader, YumeConfig};
use crate::error::{ApiError, StoreError};
use crate::llm::LlmClient;
use crate::provider::{resolve_settings, ProcessEnv, TaskKind};
use crate::publish::EntryDraft;
use crate::reader::{self, ReaderOptions};
use crate::store::{FsProjectStore, ProjectStore};
use crate::workflow::NovelCommandService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runtime context for CLI execution: workspace, config, project store and async runtime.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    workspace_root: PathBuf,
    config: YumeConfig,
    store: Arc<FsProjectStore>,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(ApiError::ConfigError(format!(
                "Invalid configuration:\n  {}",
                messages.join("\n  ")
            )));
        }

        let books_root = config.books_root(&workspace_root);
        debug!(books_dir = %books_root.display(), "Using books directory");
        let store = Arc::new(FsProjectStore::new(books_root));

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create async runtime: {}", e)))?;

        Ok(Self {
            workspace_root,
            config,
            store,
            runtime,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &YumeConfig {
        &self.config
    }

    pub fn store(&self) -> &FsProjectStore {
        &self.store
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let name = command_name(command);
        let started = Instant::now();
        info!(command = %name, "Command started");
        let result = self.execute_inner(command);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(command = %name, elapsed_ms, "Command finished"),
            Err(e) => warn!(command = %name, elapsed_ms, error = %e, "Command failed"),
        }
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Init { title } => self.handle_init(title),
            Commands::List => Ok(format_project_list(&self.store.list_projects()?)),
            Commands::Status { title, format } => self.handle_status(title, format),
            Commands::GeneratePlot {
                title,
                arc,
                dry_run,
            } => self.handle_generate_plot(title, arc.as_deref(), *dry_run),
            Commands::GenerateEpisode {
                title,
                arc,
                episodes,
                dry_run,
                force,
            } => self.handle_generate_episode(title, arc, episodes, *dry_run, *force),
            Commands::Read {
                title,
                port,
                auto_port,
                no_browser,
            } => self.handle_read(title.as_deref(), *port, *auto_port, *no_browser),
            Commands::Publish {
                title,
                episode,
                blog_title,
                categories,
                draft,
                preview,
                preview_html,
                yes,
            } => self.handle_publish(PublishArgs {
                title,
                episode: episode.as_deref(),
                blog_title: blog_title.as_deref(),
                categories: categories.as_deref(),
                draft: *draft,
                preview: *preview,
                preview_html: *preview_html,
                yes: *yes,
            }),
            Commands::Provider { command } => self.handle_provider_command(command),
        }
    }

    fn handle_init(&self, title: &str) -> Result<String, ApiError> {
        let outcome = self.store.create_project(title)?;
        Ok(format_init_summary(title, &outcome))
    }

    fn handle_status(&self, title: &str, format: &str) -> Result<String, ApiError> {
        let status = self.store.status(title)?;
        if format == "json" {
            format_status_json(&status)
        } else {
            Ok(format_status_text(&status))
        }
    }

    fn llm_for(&self, task: TaskKind) -> Result<LlmClient, ApiError> {
        let client = LlmClient::for_task(&self.config.llm, task)?;
        info!(
            task = %task,
            provider = client.provider_name(),
            model = client.model_name(),
            "Using LLM provider"
        );
        Ok(client)
    }

    fn handle_generate_plot(
        &self,
        title: &str,
        arc: Option<&str>,
        dry_run: bool,
    ) -> Result<String, ApiError> {
        let store = self.store.as_ref();
        if dry_run {
            let plan = NovelCommandService::plan_plot(store, title, arc)?;
            return Ok(format_plot_plan(&plan));
        }

        let llm = self.llm_for(TaskKind::Plot)?;
        let run = self
            .runtime
            .block_on(NovelCommandService::generate_plot(store, &llm, title, arc))?;
        Ok(format_plot_run(&run))
    }

    fn handle_generate_episode(
        &self,
        title: &str,
        arc: &str,
        episodes: &str,
        dry_run: bool,
        force: bool,
    ) -> Result<String, ApiError> {
        let store = self.store.as_ref();
        let plan = NovelCommandService::plan_episodes(store, title, arc, episodes, force)?;
        if dry_run {
            return Ok(format_episode_plan(&plan));
        }

        let llm = self.llm_for(TaskKind::Episode)?;
        let report = self.runtime.block_on(NovelCommandService::generate_episodes(
            store,
            &llm,
            &plan,
            &|outcome| println!("{}", format_episode_outcome(arc, outcome)),
        ))?;
        Ok(format_episode_report(&report))
    }

    fn handle_read(
        &self,
        title: Option<&str>,
        port: Option<u16>,
        auto_port: bool,
        no_browser: bool,
    ) -> Result<String, ApiError> {
        if let Some(title) = title {
            if !self.store.project_exists(title) {
                return Err(StoreError::ProjectNotFound(title.to_string()).into());
            }
        }

        let reader_config = &self.config.reader;
        let options = ReaderOptions {
            host: reader_config.host.clone(),
            port: port.unwrap_or(reader_config.port),
            auto_port: auto_port || reader_config.auto_port,
            max_port_attempts: reader_config.max_port_attempts,
            open_browser: reader_config.open_browser && !no_browser,
            title: title.map(str::to_string),
        };
        let store: Arc<dyn ProjectStore> = self.store.clone();
        self.runtime.block_on(reader::serve(store, options))?;
        Ok("Reader stopped.".to_string())
    }

    fn handle_publish(&self, args: PublishArgs<'_>) -> Result<String, ApiError> {
        let title = args.title;
        if !self.store.project_exists(title) {
            return Err(StoreError::ProjectNotFound(title.to_string()).into());
        }
        let Some(episode) = args.episode else {
            return Ok(format_story_list(title, &self.store.list_stories(title)?));
        };

        let story = self.store.read_story(title, episode)?;
        let draft = EntryDraft::from_story(title, &story, args.blog_title, args.categories, args.draft);

        if args.preview || args.preview_html {
            return Ok(format_publish_preview(&draft.preview(args.preview_html)));
        }

        let credentials = self.config.hatena.resolve(&ProcessEnv)?;
        let client = credentials.client()?;

        if !args.yes {
            use dialoguer::Confirm;
            println!("{}", format_publish_confirmation(client.blog_id(), &draft));
            let confirmed = Confirm::new()
                .with_prompt("Publish this episode?")
                .default(false)
                .interact()
                .map_err(|e| ApiError::ConfigError(format!("Failed to get user input: {}", e)))?;
            if !confirmed {
                return Ok("Publishing cancelled".to_string());
            }
        }

        let entry = self.runtime.block_on(draft.publish(&client))?;
        Ok(format_published(&draft, &entry))
    }

    fn handle_provider_command(&self, command: &ProviderCommands) -> Result<String, ApiError> {
        match command {
            ProviderCommands::Show { task, format } => {
                let tasks = match task {
                    Some(task) => vec![TaskKind::parse(task)?],
                    None => vec![TaskKind::Plot, TaskKind::Episode],
                };
                let resolved = tasks
                    .into_iter()
                    .map(|task| resolve_settings(&self.config.llm, task, &ProcessEnv))
                    .collect::<Result<Vec<_>, _>>()?;
                if format == "json" {
                    format_provider_show_json(&resolved)
                } else {
                    Ok(format_provider_show_text(&resolved))
                }
            }
            ProviderCommands::Models { task } => {
                let llm = self.llm_for(TaskKind::parse(task)?)?;
                let models = self.runtime.block_on(llm.list_models())?;
                Ok(format_model_list(llm.settings(), &models))
            }
        }
    }
}

struct PublishArgs<'a> {
    title: &'a str,
    episode: Option<&'a str>,
    blog_title: Option<&'a str>,
    categories: Option<&'a str>,
    draft: bool,
    preview: bool,
    preview_html: bool,
    yes: bool,
}
