//! Local web reader for generated novels.
//!
//! Serves every project under the books directory as plain HTML pages:
//! `/` lists novels, `/novel/:title` lists episodes, `/novel/:title/:slug` shows one episode
//! with previous/next links. Pages are rendered from the store on every request, so newly
//! generated episodes appear without a restart.

pub mod render;

use crate::error::ApiError;
use crate::store::{parse_episode_stem, ProjectStore};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::TcpListener as StdTcpListener;
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, info, warn};

const NOVEL_CSS: &str = include_str!("../static/novel.css");

/// One episode as displayed
#[derive(Debug, Clone, PartialEq)]
pub struct StoryView {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub arc: String,
    pub episode: u32,
    pub body: String,
}

/// A novel with its episodes in file order
#[derive(Debug, Clone, PartialEq)]
pub struct NovelView {
    pub title: String,
    pub stories: Vec<StoryView>,
}

impl NovelView {
    pub fn load(store: &dyn ProjectStore, title: &str) -> Result<Self, ApiError> {
        let stems = store.list_stories(title)?;
        let mut stories = Vec::with_capacity(stems.len());

        for stem in stems {
            let stored = match store.read_story(title, &stem) {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(title, story = %stem, error = %e, "Skipping unreadable story");
                    continue;
                }
            };
            let (arc, episode) = parse_episode_stem(&stem)
                .map(|(arc, n)| (arc.to_string(), n))
                .unwrap_or_else(|| ("未分類".to_string(), 1));

            let (story_title, date) = match &stored.front_matter {
                Some(fm) => (fm.title.clone(), fm.date.clone()),
                None => (format!("{} 第{}話", arc, episode), String::new()),
            };

            stories.push(StoryView {
                slug: story_slug(&stem),
                title: story_title,
                date,
                arc,
                episode,
                body: stored.body,
            });
        }

        Ok(Self {
            title: title.to_string(),
            stories,
        })
    }

    pub fn position(&self, slug: &str) -> Option<usize> {
        self.stories.iter().position(|s| s.slug == slug)
    }
}

/// URL slug of a story file stem.
pub fn story_slug(stem: &str) -> String {
    stem.replace('_', "-").to_lowercase()
}

#[derive(Clone)]
struct ReaderState {
    store: Arc<dyn ProjectStore>,
}

/// Router for the reader pages.
pub fn router(store: Arc<dyn ProjectStore>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/novel/:title", get(novel_handler))
        .route("/novel/:title/:slug", get(story_handler))
        .route("/static/novel.css", get(css_handler))
        .with_state(ReaderState { store })
}

async fn index_handler(State(state): State<ReaderState>) -> Response {
    match state.store.list_projects() {
        Ok(titles) => Html(render::index_page(&titles)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn novel_handler(
    State(state): State<ReaderState>,
    Path(title): Path<String>,
) -> Response {
    if !state.store.project_exists(&title) {
        return not_found(&format!("小説「{}」は見つかりません", title));
    }
    match NovelView::load(state.store.as_ref(), &title) {
        Ok(novel) => Html(render::novel_page(&novel)).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn story_handler(
    State(state): State<ReaderState>,
    Path((title, slug)): Path<(String, String)>,
) -> Response {
    if !state.store.project_exists(&title) {
        return not_found(&format!("小説「{}」は見つかりません", title));
    }
    let novel = match NovelView::load(state.store.as_ref(), &title) {
        Ok(novel) => novel,
        Err(e) => return internal_error(e),
    };
    match novel.position(&slug) {
        Some(index) => Html(render::story_page(&novel, index)).into_response(),
        None => not_found(&format!("「{}」にエピソード {} はありません", title, slug)),
    }
}

async fn css_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        NOVEL_CSS,
    )
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Html(render::not_found_page(message))).into_response()
}

fn internal_error(error: ApiError) -> Response {
    warn!(error = %error, "Reader request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
}

/// First port in `start..start + attempts` that can be bound on `host`.
pub fn find_available_port(host: &str, start: u16, attempts: u16) -> Option<u16> {
    (0..attempts)
        .filter_map(|offset| start.checked_add(offset))
        .find(|port| StdTcpListener::bind((host, *port)).is_ok())
}

/// How the reader is started
#[derive(Debug, Clone)]
pub struct ReaderOptions {
    pub host: String,
    pub port: u16,
    /// Probe following ports when `port` is taken
    pub auto_port: bool,
    pub max_port_attempts: u16,
    pub open_browser: bool,
    /// Novel to open in the browser, the index when `None`
    pub title: Option<String>,
}

impl ReaderOptions {
    fn choose_port(&self) -> Result<u16, ApiError> {
        if !self.auto_port {
            return Ok(self.port);
        }
        find_available_port(&self.host, self.port, self.max_port_attempts.max(1)).ok_or_else(|| {
            ApiError::ReaderFailed(format!(
                "No free port in {}..{}",
                self.port,
                self.port.saturating_add(self.max_port_attempts)
            ))
        })
    }
}

/// Serve until Ctrl-C.
pub async fn serve(store: Arc<dyn ProjectStore>, options: ReaderOptions) -> Result<(), ApiError> {
    let port = options.choose_port()?;
    let addr = format!("{}:{}", options.host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        ApiError::ReaderFailed(format!(
            "Cannot listen on {}: {}. Try --port {} or --auto-port.",
            addr,
            e,
            port.saturating_add(1)
        ))
    })?;

    let browse_host = if options.host == "0.0.0.0" { "localhost" } else { options.host.as_str() };
    let url = match &options.title {
        Some(title) => format!("http://{}:{}/novel/{}", browse_host, port, render::encode_segment(title)),
        None => format!("http://{}:{}/", browse_host, port),
    };
    info!(url = %url, "Reader listening");
    println!("Reader running at {} (Ctrl-C to stop)", url);

    if options.open_browser {
        open_browser(&url);
    }

    axum::serve(listener, router(store))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::ReaderFailed(e.to_string()))?;

    info!("Reader stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
    }
}

fn open_browser(url: &str) {
    let (program, args): (&str, Vec<&str>) = if cfg!(target_os = "macos") {
        ("open", vec![url])
    } else if cfg!(target_os = "windows") {
        ("cmd", vec!["/C", "start", "", url])
    } else {
        ("xdg-open", vec![url])
    };
    match Command::new(program).args(&args).spawn() {
        Ok(_) => debug!(program, url, "Opened browser"),
        Err(e) => warn!(program, error = %e, "Could not open a browser"),
    }
}
