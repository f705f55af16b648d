//! Project Store
//!
//! Persists a novel project on disk: the user-authored settings, the plot document and the
//! generated episodes. One directory per project under the configured books directory:
//!
//! ```text
//! <books_dir>/<title>/
//!     setting.md
//!     character.md      (optional)
//!     plot.json
//!     stories/<arc>_<NN>.md
//! ```

pub mod frontmatter;
pub mod fs;

pub use frontmatter::{EpisodeFrontMatter, EpisodeMeta};
pub use fs::FsProjectStore;

use crate::error::{ApiError, StoreError};
use crate::plot::{ArcPlot, PlotDocument};
use serde::Serialize;
use std::path::PathBuf;

/// Result of creating a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub project_dir: PathBuf,
    /// False when a `setting.md` already existed and was left alone
    pub setting_created: bool,
}

/// Plot file state as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlotState {
    Missing,
    Corrupted { message: String },
    Ready { arcs: Vec<ArcSummary> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArcSummary {
    pub name: String,
    pub episodes: usize,
    pub written: usize,
}

/// Overview of one project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub title: String,
    pub project_dir: PathBuf,
    pub has_setting: bool,
    pub has_character: bool,
    pub plot: PlotState,
    pub story_count: usize,
}

/// A stored episode file split into metadata and text
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEpisode {
    pub stem: String,
    pub front_matter: Option<EpisodeFrontMatter>,
    pub body: String,
}

/// Project store interface
pub trait ProjectStore: Send + Sync {
    fn create_project(&self, title: &str) -> Result<InitOutcome, ApiError>;
    fn project_exists(&self, title: &str) -> bool;
    fn list_projects(&self) -> Result<Vec<String>, ApiError>;

    fn read_setting(&self, title: &str) -> Result<String, ApiError>;
    /// Character sheet, empty when the project has none.
    fn read_character(&self, title: &str) -> Result<String, ApiError>;

    /// Setting followed by the character sheet when one exists.
    fn read_all_settings(&self, title: &str) -> Result<String, ApiError> {
        let setting = self.read_setting(title)?;
        let character = self.read_character(title)?;
        if character.trim().is_empty() {
            Ok(setting)
        } else {
            Ok(format!("{}\n\n---\n\n{}", setting, character))
        }
    }

    fn read_plot(&self, title: &str) -> Result<PlotDocument, ApiError>;
    /// Write the plot. With `merge`, arcs are merged into the stored plot first.
    /// Returns the document that was written.
    fn save_plot(
        &self,
        title: &str,
        plot: PlotDocument,
        merge: bool,
    ) -> Result<PlotDocument, ApiError>;

    fn save_arc_plot(&self, title: &str, arc: ArcPlot) -> Result<PlotDocument, ApiError> {
        let mut update = PlotDocument::new();
        update.upsert_arc(arc);
        self.save_plot(title, update, true)
    }

    fn episode_exists(&self, title: &str, arc: &str, episode: u32) -> bool;
    fn save_episode(
        &self,
        title: &str,
        arc: &str,
        episode: u32,
        content: &str,
        meta: &EpisodeMeta,
    ) -> Result<PathBuf, ApiError>;
    /// Episode body without front matter, `None` when it was never written.
    fn read_episode(&self, title: &str, arc: &str, episode: u32)
        -> Result<Option<String>, ApiError>;

    /// Body of the episode before `(arc, episode)` in plot order, if written.
    fn previous_episode_content(
        &self,
        title: &str,
        arc: &str,
        episode: u32,
        plot: &PlotDocument,
    ) -> Result<Option<String>, ApiError> {
        match plot.previous_episode(arc, episode) {
            Some((previous_arc, previous)) => self.read_episode(title, previous_arc, previous),
            None => Ok(None),
        }
    }

    fn list_stories(&self, title: &str) -> Result<Vec<String>, ApiError>;
    fn read_story(&self, title: &str, stem: &str) -> Result<StoredEpisode, ApiError>;
    fn status(&self, title: &str) -> Result<ProjectStatus, ApiError>;
}

/// Reject names that could escape the books directory.
pub fn validate_name(kind: &str, name: &str) -> Result<(), StoreError> {
    let invalid = |reason: &str| {
        Err(StoreError::InvalidName(format!(
            "{} '{}' {}",
            kind, name, reason
        )))
    };
    if name.trim().is_empty() {
        return invalid("is empty");
    }
    if name.contains('/') || name.contains('\\') || name.contains('\0') {
        return invalid("contains a path separator");
    }
    if name.contains("..") || name.starts_with('.') {
        return invalid("must not start with '.' or contain '..'");
    }
    Ok(())
}

/// File stem of an episode: `<arc>_<NN>`.
pub fn episode_stem(arc: &str, episode: u32) -> String {
    format!("{}_{:02}", arc, episode)
}

/// Split a stem back into arc and episode number.
pub fn parse_episode_stem(stem: &str) -> Option<(&str, u32)> {
    let (arc, number) = stem.rsplit_once('_')?;
    if arc.is_empty() {
        return None;
    }
    number.parse().ok().map(|n| (arc, n))
}
