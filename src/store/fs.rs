//! Filesystem-backed project store.

use super::frontmatter::{self, EpisodeFrontMatter, EpisodeMeta};
use super::{
    episode_stem, parse_episode_stem, validate_name, ArcSummary, InitOutcome, PlotState,
    ProjectStatus, ProjectStore, StoredEpisode,
};
use crate::error::{ApiError, StoreError};
use crate::plot::PlotDocument;
use crate::prompts::SETTING_TEMPLATE;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const SETTING_FILE: &str = "setting.md";
const CHARACTER_FILE: &str = "character.md";
const PLOT_FILE: &str = "plot.json";
const STORIES_DIR: &str = "stories";

/// Project store rooted at the books directory
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    books_dir: PathBuf,
}

impl FsProjectStore {
    pub fn new<P: Into<PathBuf>>(books_dir: P) -> Self {
        Self {
            books_dir: books_dir.into(),
        }
    }

    pub fn books_dir(&self) -> &Path {
        &self.books_dir
    }

    pub fn project_dir(&self, title: &str) -> Result<PathBuf, StoreError> {
        validate_name("Title", title)?;
        Ok(self.books_dir.join(title))
    }

    fn existing_project_dir(&self, title: &str) -> Result<PathBuf, StoreError> {
        let dir = self.project_dir(title)?;
        if !dir.is_dir() {
            return Err(StoreError::ProjectNotFound(title.to_string()));
        }
        Ok(dir)
    }

    fn episode_path(&self, title: &str, arc: &str, episode: u32) -> Result<PathBuf, StoreError> {
        validate_name("Arc", arc)?;
        Ok(self
            .project_dir(title)?
            .join(STORIES_DIR)
            .join(format!("{}.md", episode_stem(arc, episode))))
    }
}

/// Write through a temporary file and rename it into place.
fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        StoreError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to move {:?} into place: {}", path, e),
        ))
    })
}

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl ProjectStore for FsProjectStore {
    fn create_project(&self, title: &str) -> Result<InitOutcome, ApiError> {
        let project_dir = self.project_dir(title)?;
        fs::create_dir_all(project_dir.join(STORIES_DIR)).map_err(StoreError::from)?;

        let setting_path = project_dir.join(SETTING_FILE);
        let setting_created = !setting_path.exists();
        if setting_created {
            write_atomic(&setting_path, SETTING_TEMPLATE)?;
            info!(path = %setting_path.display(), "Created setting template");
        }

        Ok(InitOutcome {
            project_dir,
            setting_created,
        })
    }

    fn project_exists(&self, title: &str) -> bool {
        self.project_dir(title).map(|d| d.is_dir()).unwrap_or(false)
    }

    fn list_projects(&self) -> Result<Vec<String>, ApiError> {
        let entries = match fs::read_dir(&self.books_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::from(e).into()),
        };

        let mut titles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::from)?;
            if !entry.file_type().map_err(StoreError::from)?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_name("Title", name).is_ok() {
                    titles.push(name.to_string());
                }
            }
        }
        titles.sort();
        Ok(titles)
    }

    fn read_setting(&self, title: &str) -> Result<String, ApiError> {
        let path = self.existing_project_dir(title)?.join(SETTING_FILE);
        read_optional(&path)?.ok_or_else(|| StoreError::SettingNotFound(path).into())
    }

    fn read_character(&self, title: &str) -> Result<String, ApiError> {
        let path = self.existing_project_dir(title)?.join(CHARACTER_FILE);
        Ok(read_optional(&path)?.unwrap_or_default())
    }

    fn read_plot(&self, title: &str) -> Result<PlotDocument, ApiError> {
        let path = self.existing_project_dir(title)?.join(PLOT_FILE);
        let text = read_optional(&path)?.ok_or(StoreError::PlotNotFound(path))?;
        PlotDocument::from_json_str(&text)
    }

    fn save_plot(
        &self,
        title: &str,
        plot: PlotDocument,
        merge: bool,
    ) -> Result<PlotDocument, ApiError> {
        let path = self.existing_project_dir(title)?.join(PLOT_FILE);

        let document = if merge && path.exists() {
            match self.read_plot(title) {
                Ok(mut existing) => {
                    existing.merge(plot);
                    existing
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Existing plot is unreadable, overwriting"
                    );
                    plot
                }
            }
        } else {
            plot
        };

        write_atomic(&path, &document.to_json_pretty()?)?;
        info!(
            path = %path.display(),
            arcs = document.arcs().len(),
            episodes = document.total_episodes(),
            merge,
            "Saved plot"
        );
        Ok(document)
    }

    fn episode_exists(&self, title: &str, arc: &str, episode: u32) -> bool {
        self.episode_path(title, arc, episode)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    fn save_episode(
        &self,
        title: &str,
        arc: &str,
        episode: u32,
        content: &str,
        meta: &EpisodeMeta,
    ) -> Result<PathBuf, ApiError> {
        self.existing_project_dir(title)?;
        let path = self.episode_path(title, arc, episode)?;

        let front_matter = EpisodeFrontMatter::build(title, arc, episode, content, meta);
        write_atomic(&path, &frontmatter::render(&front_matter, content)?)?;

        info!(path = %path.display(), arc, episode, chars = content.chars().count(), "Saved episode");
        Ok(path)
    }

    fn read_episode(
        &self,
        title: &str,
        arc: &str,
        episode: u32,
    ) -> Result<Option<String>, ApiError> {
        let path = self.episode_path(title, arc, episode)?;
        Ok(read_optional(&path)?.map(|document| frontmatter::split(&document).1.to_string()))
    }

    fn list_stories(&self, title: &str) -> Result<Vec<String>, ApiError> {
        let stories_dir = self.existing_project_dir(title)?.join(STORIES_DIR);
        let entries = match fs::read_dir(&stories_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::from(e).into()),
        };

        let mut stems = Vec::new();
        for entry in entries {
            let path = entry.map_err(StoreError::from)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
        stems.sort();
        debug!(title, count = stems.len(), "Listed stories");
        Ok(stems)
    }

    fn read_story(&self, title: &str, stem: &str) -> Result<StoredEpisode, ApiError> {
        validate_name("Story", stem)?;
        let path = self
            .existing_project_dir(title)?
            .join(STORIES_DIR)
            .join(format!("{}.md", stem));
        let document =
            read_optional(&path)?.ok_or_else(|| StoreError::StoryNotFound(stem.to_string()))?;

        let (front_matter, body) = frontmatter::parse(&document);
        Ok(StoredEpisode {
            stem: stem.to_string(),
            front_matter,
            body: body.to_string(),
        })
    }

    fn status(&self, title: &str) -> Result<ProjectStatus, ApiError> {
        let project_dir = self.existing_project_dir(title)?;
        let stories = self.list_stories(title)?;

        let plot = if !project_dir.join(PLOT_FILE).exists() {
            PlotState::Missing
        } else {
            match self.read_plot(title) {
                Ok(plot) => PlotState::Ready {
                    arcs: plot
                        .arcs()
                        .iter()
                        .map(|arc| ArcSummary {
                            name: arc.name.clone(),
                            episodes: arc.episode_count(),
                            written: stories
                                .iter()
                                .filter_map(|s| parse_episode_stem(s))
                                .filter(|(a, n)| *a == arc.name && arc.episodes.contains_key(n))
                                .count(),
                        })
                        .collect(),
                },
                Err(e) => PlotState::Corrupted {
                    message: e.to_string(),
                },
            }
        };

        Ok(ProjectStatus {
            title: title.to_string(),
            has_setting: project_dir.join(SETTING_FILE).is_file(),
            has_character: project_dir.join(CHARACTER_FILE).is_file(),
            project_dir,
            plot,
            story_count: stories.len(),
        })
    }
}
