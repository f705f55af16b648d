//! Novel command service: plot and episode workflows on top of the store and an LLM client.
//!
//! The CLI parses arguments, calls one method per command and formats the returned report.
//! Dry runs go through the same planning step as real runs so they report exactly what a real
//! run would generate or skip.

use crate::error::ApiError;
use crate::llm::{EpisodeRequest, LlmClient, UsageTotals};
use crate::plot::{parse_episode_numbers, PlotDocument};
use crate::store::{EpisodeMeta, ProjectStore};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

const EXCERPT_CHARS: usize = 100;

/// What `generate-plot` would send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPlan {
    pub title: String,
    /// Single arc to generate, the whole plot when `None`
    pub arc: Option<String>,
    pub setting_chars: usize,
    pub has_character: bool,
    pub setting_excerpt: String,
    /// Arcs already in plot.json
    pub existing_arcs: Vec<String>,
}

/// Result of a plot generation
#[derive(Debug, Clone, Serialize)]
pub struct PlotRun {
    pub title: String,
    pub arc: Option<String>,
    /// Document as written to plot.json
    pub plot: PlotDocument,
    pub elapsed_ms: u128,
    pub usage: UsageTotals,
}

/// One requested episode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedEpisode {
    pub episode: u32,
    pub plot: String,
    pub exists: bool,
}

impl PlannedEpisode {
    /// Skipped unless overwriting was requested
    pub fn will_generate(&self, force: bool) -> bool {
        force || !self.exists
    }
}

/// Episodes a `generate-episode` run covers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodePlan {
    pub title: String,
    pub arc: String,
    pub force: bool,
    pub setting_chars: usize,
    pub has_character: bool,
    pub episodes: Vec<PlannedEpisode>,
}

impl EpisodePlan {
    pub fn pending(&self) -> impl Iterator<Item = &PlannedEpisode> {
        self.episodes.iter().filter(move |e| e.will_generate(self.force))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeOutcome {
    Written {
        episode: u32,
        path: PathBuf,
        chars: usize,
    },
    Skipped {
        episode: u32,
    },
}

impl EpisodeOutcome {
    pub fn episode(&self) -> u32 {
        match self {
            EpisodeOutcome::Written { episode, .. } | EpisodeOutcome::Skipped { episode } => {
                *episode
            }
        }
    }
}

/// Result of an episode batch
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeBatchReport {
    pub title: String,
    pub arc: String,
    pub outcomes: Vec<EpisodeOutcome>,
    pub elapsed_ms: u128,
    pub usage: UsageTotals,
}

impl EpisodeBatchReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, EpisodeOutcome::Written { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.written()
    }
}

pub struct NovelCommandService;

impl NovelCommandService {
    pub fn plan_plot(
        store: &dyn ProjectStore,
        title: &str,
        arc: Option<&str>,
    ) -> Result<PlotPlan, ApiError> {
        let setting = store.read_all_settings(title)?;
        let has_character = !store.read_character(title)?.trim().is_empty();
        let existing_arcs = match store.read_plot(title) {
            Ok(plot) => plot.arc_names().into_iter().map(str::to_string).collect(),
            Err(_) => Vec::new(),
        };
        Ok(PlotPlan {
            title: title.to_string(),
            arc: arc.map(str::to_string),
            setting_chars: setting.chars().count(),
            has_character,
            setting_excerpt: excerpt(&setting, EXCERPT_CHARS),
            existing_arcs,
        })
    }

    /// Generate the whole plot (replacing plot.json) or one arc (merged into it).
    pub async fn generate_plot(
        store: &dyn ProjectStore,
        llm: &LlmClient,
        title: &str,
        arc: Option<&str>,
    ) -> Result<PlotRun, ApiError> {
        let started = Instant::now();
        let result = Self::run_plot(store, llm, title, arc).await;
        llm.release_cache().await;

        Ok(PlotRun {
            title: title.to_string(),
            arc: arc.map(str::to_string),
            plot: result?,
            elapsed_ms: started.elapsed().as_millis(),
            usage: llm.usage(),
        })
    }

    async fn run_plot(
        store: &dyn ProjectStore,
        llm: &LlmClient,
        title: &str,
        arc: Option<&str>,
    ) -> Result<PlotDocument, ApiError> {
        let setting = store.read_all_settings(title)?;

        match arc {
            Some(arc) => {
                let existing = store.read_plot(title).ok();
                let arc_plot = llm.generate_arc_plot(&setting, arc, existing.as_ref()).await?;
                info!(title, arc, episodes = arc_plot.episode_count(), "Generated arc plot");
                store.save_arc_plot(title, arc_plot)
            }
            None => {
                let plot = llm.generate_plot(&setting).await?;
                info!(
                    title,
                    arcs = plot.arcs().len(),
                    episodes = plot.total_episodes(),
                    "Generated plot"
                );
                store.save_plot(title, plot, false)
            }
        }
    }

    /// Resolve `spec` against the plot and mark episodes that are already written.
    pub fn plan_episodes(
        store: &dyn ProjectStore,
        title: &str,
        arc: &str,
        spec: &str,
        force: bool,
    ) -> Result<EpisodePlan, ApiError> {
        let plot = store.read_plot(title)?;
        let arc_plot = plot
            .arc(arc)
            .ok_or_else(|| ApiError::ArcNotFound(arc.to_string()))?;
        let numbers = parse_episode_numbers(spec, arc_plot.last_episode())?;

        let mut episodes = Vec::with_capacity(numbers.len());
        for episode in numbers {
            let text = plot.episode_plot(arc, episode)?;
            episodes.push(PlannedEpisode {
                episode,
                plot: text.to_string(),
                exists: store.episode_exists(title, arc, episode),
            });
        }

        let setting = store.read_all_settings(title)?;
        Ok(EpisodePlan {
            title: title.to_string(),
            arc: arc.to_string(),
            force,
            setting_chars: setting.chars().count(),
            has_character: !store.read_character(title)?.trim().is_empty(),
            episodes,
        })
    }

    /// Generate the pending episodes of `plan` in order.
    ///
    /// Each episode sees the body of the one before it in plot order, including episodes
    /// written earlier in the same batch. The context cache is released when the batch ends,
    /// whether or not it succeeded.
    pub async fn generate_episodes(
        store: &dyn ProjectStore,
        llm: &LlmClient,
        plan: &EpisodePlan,
        on_outcome: &(dyn Fn(&EpisodeOutcome) + Send + Sync),
    ) -> Result<EpisodeBatchReport, ApiError> {
        let started = Instant::now();
        let result = Self::run_batch(store, llm, plan, on_outcome).await;
        llm.release_cache().await;

        let outcomes = result?;
        Ok(EpisodeBatchReport {
            title: plan.title.clone(),
            arc: plan.arc.clone(),
            outcomes,
            elapsed_ms: started.elapsed().as_millis(),
            usage: llm.usage(),
        })
    }

    async fn run_batch(
        store: &dyn ProjectStore,
        llm: &LlmClient,
        plan: &EpisodePlan,
        on_outcome: &(dyn Fn(&EpisodeOutcome) + Send + Sync),
    ) -> Result<Vec<EpisodeOutcome>, ApiError> {
        let title = plan.title.as_str();
        let arc = plan.arc.as_str();
        let setting = store.read_all_settings(title)?;
        let plot = store.read_plot(title)?;
        let provider = llm.settings().provider.value;
        let author = format!("{} {}", provider.display_name(), llm.model_name());

        let mut outcomes = Vec::with_capacity(plan.episodes.len());
        for planned in &plan.episodes {
            let episode = planned.episode;
            if !planned.will_generate(plan.force) {
                info!(title, arc, episode, "Episode exists, skipping");
                let outcome = EpisodeOutcome::Skipped { episode };
                on_outcome(&outcome);
                outcomes.push(outcome);
                continue;
            }

            let previous = store.previous_episode_content(title, arc, episode, &plot)?;
            let content = llm
                .generate_episode_with_context(EpisodeRequest {
                    setting: &setting,
                    plot: &plot,
                    arc,
                    episode,
                    previous_episode: previous.as_deref(),
                })
                .await
                .map_err(|e| {
                    warn!(title, arc, episode, error = %e, "Episode generation failed");
                    e
                })?;

            let meta = EpisodeMeta {
                author: author.clone(),
                model: Some(llm.model_name().to_string()),
                episode_plot: Some(planned.plot.clone()),
            };
            let path = store.save_episode(title, arc, episode, &content, &meta)?;
            let outcome = EpisodeOutcome::Written {
                episode,
                path,
                chars: content.chars().count(),
            };
            on_outcome(&outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

pub(crate) fn excerpt(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(limit).collect();
        cut.push_str("...");
        cut
    }
}
