//! Integration tests for the filesystem project store

use super::test_utils::store_with_project;
use tempfile::TempDir;
use yumechain::error::{ApiError, StoreError};
use yumechain::plot::{ArcPlot, PlotDocument};
use yumechain::store::{EpisodeMeta, FsProjectStore, PlotState, ProjectStore};

fn meta() -> EpisodeMeta {
    EpisodeMeta {
        author: "Gemini gemini-2.0-flash".to_string(),
        model: Some("gemini-2.0-flash".to_string()),
        episode_plot: Some("主人公が旅に出る".to_string()),
    }
}

fn two_arc_plot() -> PlotDocument {
    let mut plot = PlotDocument::new();
    plot.upsert_arc(ArcPlot::new("序章").with_episode(1, "出会い").with_episode(2, "旅立ち"));
    plot.upsert_arc(ArcPlot::new("本編").with_episode(1, "試練"));
    plot
}

#[test]
fn test_project_layout_on_disk() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), "夢の鎖", "剣と魔法の世界");

    let dir = temp.path().join("books").join("夢の鎖");
    assert!(dir.join("setting.md").is_file());
    assert!(dir.join("stories").is_dir());

    store.save_plot("夢の鎖", two_arc_plot(), false).unwrap();
    assert!(dir.join("plot.json").is_file());

    let path = store
        .save_episode("夢の鎖", "序章", 1, "# 出会い\n\n春。", &meta())
        .unwrap();
    assert_eq!(path, dir.join("stories").join("序章_01.md"));
    // No temp files are left behind by atomic writes.
    let leftovers: Vec<_> = std::fs::read_dir(dir.join("stories"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[test]
fn test_saved_episode_carries_front_matter() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), "夢の鎖", "設定");
    store.save_plot("夢の鎖", two_arc_plot(), false).unwrap();
    store
        .save_episode("夢の鎖", "序章", 2, "# 旅立ち\n\n朝が来た。", &meta())
        .unwrap();

    let story = store.read_story("夢の鎖", "序章_02").unwrap();
    let fm = story.front_matter.expect("front matter");
    assert_eq!(fm.title, "旅立ち 夢の鎖");
    assert_eq!(fm.author, "Gemini gemini-2.0-flash");
    assert_eq!(fm.series, "夢の鎖");
    assert_eq!(fm.chapter, 2);
    assert_eq!(fm.lang, "ja");
    assert_eq!(fm.arc.as_deref(), Some("序章"));
    assert!(fm.description.starts_with("主人公が旅に出る"));
    assert!(story.body.starts_with("# 旅立ち"));

    let body = store.read_episode("夢の鎖", "序章", 2).unwrap().unwrap();
    assert!(!body.contains("---"));
    assert!(body.contains("朝が来た。"));
}

#[test]
fn test_previous_episode_crosses_arcs() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), "夢の鎖", "設定");
    let plot = store.save_plot("夢の鎖", two_arc_plot(), false).unwrap();

    assert_eq!(store.previous_episode_content("夢の鎖", "本編", 1, &plot).unwrap(), None);

    store
        .save_episode("夢の鎖", "序章", 2, "序章の終わり", &meta())
        .unwrap();
    let previous = store
        .previous_episode_content("夢の鎖", "本編", 1, &plot)
        .unwrap()
        .unwrap();
    assert_eq!(previous.trim(), "序章の終わり");

    assert_eq!(store.previous_episode_content("夢の鎖", "序章", 1, &plot).unwrap(), None);
}

#[test]
fn test_arc_plot_merge_keeps_order() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), "夢の鎖", "設定");
    store.save_plot("夢の鎖", two_arc_plot(), false).unwrap();

    store
        .save_arc_plot("夢の鎖", ArcPlot::new("序章").with_episode(1, "新しい出会い"))
        .unwrap();
    let merged = store
        .save_arc_plot("夢の鎖", ArcPlot::new("終章").with_episode(1, "別れ"))
        .unwrap();

    assert_eq!(merged.arc_names(), vec!["序章", "本編", "終章"]);
    let reloaded = store.read_plot("夢の鎖").unwrap();
    assert_eq!(reloaded, merged);
    assert_eq!(reloaded.episode_plot("序章", 1).unwrap(), "新しい出会い");
    // The replaced arc only holds what the new arc plot contains.
    assert_eq!(reloaded.episode_count("序章"), 1);
}

#[test]
fn test_status_reports_plot_and_written_episodes() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), "夢の鎖", "設定");

    let status = store.status("夢の鎖").unwrap();
    assert!(status.has_setting);
    assert!(!status.has_character);
    assert_eq!(status.plot, PlotState::Missing);

    store.save_plot("夢の鎖", two_arc_plot(), false).unwrap();
    store.save_episode("夢の鎖", "序章", 1, "本文", &meta()).unwrap();
    std::fs::write(
        temp.path().join("books").join("夢の鎖").join("character.md"),
        "主人公: アキ",
    )
    .unwrap();

    let status = store.status("夢の鎖").unwrap();
    assert!(status.has_character);
    assert_eq!(status.story_count, 1);
    match status.plot {
        PlotState::Ready { arcs } => {
            assert_eq!(arcs.len(), 2);
            assert_eq!(arcs[0].name, "序章");
            assert_eq!(arcs[0].episodes, 2);
            assert_eq!(arcs[0].written, 1);
            assert_eq!(arcs[1].written, 0);
        }
        other => panic!("expected a ready plot, got {:?}", other),
    }

    let settings = store.read_all_settings("夢の鎖").unwrap();
    assert!(settings.starts_with("設定"));
    assert!(settings.ends_with("主人公: アキ"));
}

#[test]
fn test_corrupted_plot_is_reported() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), "夢の鎖", "設定");
    std::fs::write(
        temp.path().join("books").join("夢の鎖").join("plot.json"),
        "{ not json",
    )
    .unwrap();

    let status = store.status("夢の鎖").unwrap();
    assert!(matches!(status.plot, PlotState::Corrupted { .. }));
    assert!(matches!(
        store.read_plot("夢の鎖").unwrap_err(),
        ApiError::PlotParse(_)
    ));
}

#[test]
fn test_missing_project_and_bad_names() {
    let temp = TempDir::new().unwrap();
    let store = FsProjectStore::new(temp.path().join("books"));

    assert!(store.list_projects().unwrap().is_empty());
    assert!(matches!(
        store.read_setting("ない").unwrap_err(),
        ApiError::StoreError(StoreError::ProjectNotFound(_))
    ));
    assert!(store.create_project("../escape").is_err());
    assert!(store.create_project("a/b").is_err());
    assert!(!store.project_exists(".."));
}
