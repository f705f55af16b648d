//! Plot and episode workflows driven through a real provider client and a mock server

use super::test_utils::{llm_client, store_with_project};
use mockito::{Matcher, Server};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use yumechain::config::LlmConfig;
use yumechain::error::ApiError;
use yumechain::plot::PlotDocument;
use yumechain::provider::TaskKind;
use yumechain::store::ProjectStore;
use yumechain::workflow::{EpisodeOutcome, NovelCommandService};

const TITLE: &str = "星降る街";
const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";
const PLOT_JSON: &str = r#"{"序章": {"1": "少女が流れ星を拾う", "2": "星の声を聞く"}, "本編": {"1": "街に異変が起こる"}}"#;

fn gemini_body(text: &str) -> String {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 50, "totalTokenCount": 150}
    })
    .to_string()
}

fn gemini_llm(cache_enabled: bool) -> LlmConfig {
    let mut llm = LlmConfig::default();
    llm.provider = Some("gemini".to_string());
    llm.cache.enabled = cache_enabled;
    llm.cache.min_context_chars = 1;
    llm
}

fn no_progress(_: &EpisodeOutcome) {}

#[tokio::test]
async fn test_generate_plot_writes_plot_json() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "星が降る港町の物語");
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .match_header("x-goog-api-key", "g-key")
        .match_body(Matcher::Regex("星が降る港町の物語".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body(&format!("```json\n{}\n```", PLOT_JSON)))
        .create_async()
        .await;

    let llm = llm_client(gemini_llm(false), TaskKind::Plot, &[("GEMINI_API_KEY", "g-key")], &server.url());
    let run = NovelCommandService::generate_plot(&store, &llm, TITLE, None).await.unwrap();
    mock.assert_async().await;

    assert_eq!(run.plot.arc_names(), vec!["序章", "本編"]);
    assert_eq!(run.usage.requests, 1);
    assert_eq!(store.read_plot(TITLE).unwrap(), run.plot);
}

#[tokio::test]
async fn test_generate_arc_plot_merges_into_existing() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    let mut server = Server::new_async().await;
    server
        .mock("POST", GENERATE_PATH)
        // The existing plot is shown to the model for continuity.
        .match_body(Matcher::Regex("街に異変が起こる".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body(r#"{"終章": {"1": "星が空に還る"}}"#))
        .create_async()
        .await;

    let llm = llm_client(gemini_llm(false), TaskKind::Plot, &[("GEMINI_API_KEY", "k")], &server.url());
    let run = NovelCommandService::generate_plot(&store, &llm, TITLE, Some("終章"))
        .await
        .unwrap();

    assert_eq!(run.plot.arc_names(), vec!["序章", "本編", "終章"]);
    assert_eq!(run.plot.episode_plot("終章", 1).unwrap(), "星が空に還る");
    assert_eq!(run.plot.episode_plot("序章", 2).unwrap(), "星の声を聞く");
}

#[tokio::test]
async fn test_episode_batch_chains_previous_episode() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    let mut server = Server::new_async().await;
    let first = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::Regex("「序章」編 第1話".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("# 流れ星\n\n一話目の本文。"))
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("「序章」編 第2話".to_string()),
            Matcher::Regex("一話目の本文".to_string()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("```markdown\n# 星の声\n\n二話目の本文。\n```"))
        .expect(1)
        .create_async()
        .await;

    let llm = llm_client(gemini_llm(false), TaskKind::Episode, &[("GEMINI_API_KEY", "k")], &server.url());
    let plan = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1-2", false).unwrap();
    assert_eq!(plan.pending().count(), 2);

    let progress = Mutex::new(Vec::new());
    let on_outcome = |outcome: &EpisodeOutcome| progress.lock().push(outcome.episode());
    let report = NovelCommandService::generate_episodes(&store, &llm, &plan, &on_outcome)
        .await
        .unwrap();

    first.assert_async().await;
    second.assert_async().await;
    assert_eq!(report.written(), 2);
    assert_eq!(*progress.lock(), vec![1, 2]);
    assert_eq!(report.usage.requests, 2);

    let story = store.read_story(TITLE, "序章_02").unwrap();
    let fm = story.front_matter.unwrap();
    assert_eq!(fm.title, format!("星の声 {}", TITLE));
    assert_eq!(fm.author, "Gemini gemini-2.0-flash");
    // A fence wrapping the whole episode is stripped before saving.
    assert!(story.body.starts_with("# 星の声"));
    assert!(!story.body.contains("```"));
}

#[tokio::test]
async fn test_episode_batch_uses_and_releases_context_cache() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/v1beta/cachedContents")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"name": "cachedContents/batch1", "expireTime": "2099-01-01T00:00:00Z"}"#)
        .expect(1)
        .create_async()
        .await;
    let generate = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::PartialJson(json!({"cachedContent": "cachedContents/batch1"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("本文"))
        .expect(2)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", "/v1beta/cachedContents/batch1")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let llm = llm_client(gemini_llm(true), TaskKind::Episode, &[("GEMINI_API_KEY", "k")], &server.url());
    let plan = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1,2", false).unwrap();
    let report = NovelCommandService::generate_episodes(&store, &llm, &plan, &no_progress)
        .await
        .unwrap();
    assert_eq!(report.written(), 2);

    // Both episodes share one cache, released when the batch ends.
    create.assert_async().await;
    generate.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_cache_failure_falls_back_to_inline_context() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    let mut server = Server::new_async().await;
    let create = server
        .mock("POST", "/v1beta/cachedContents")
        .with_status(400)
        .with_body(r#"{"error": {"message": "Cached content is too small"}}"#)
        .expect(1)
        .create_async()
        .await;
    let inline = server
        .mock("POST", GENERATE_PATH)
        .match_body(Matcher::Regex("systemInstruction".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("インラインの本文"))
        .expect(2)
        .create_async()
        .await;

    let llm = llm_client(gemini_llm(true), TaskKind::Episode, &[("GEMINI_API_KEY", "k")], &server.url());
    let plan = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1-2", false).unwrap();
    let report = NovelCommandService::generate_episodes(&store, &llm, &plan, &no_progress)
        .await
        .unwrap();

    assert_eq!(report.written(), 2);
    // After the first failure the client stops trying to cache.
    create.assert_async().await;
    inline.assert_async().await;
}

#[tokio::test]
async fn test_existing_episodes_are_skipped_unless_forced() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(gemini_body("新しい本文"))
        .expect(1)
        .create_async()
        .await;
    let llm = llm_client(gemini_llm(false), TaskKind::Episode, &[("GEMINI_API_KEY", "k")], &server.url());

    let first = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1", false).unwrap();
    NovelCommandService::generate_episodes(&store, &llm, &first, &no_progress)
        .await
        .unwrap();

    let plan = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1", false).unwrap();
    assert!(plan.episodes[0].exists);
    assert_eq!(plan.pending().count(), 0);
    let report = NovelCommandService::generate_episodes(&store, &llm, &plan, &no_progress)
        .await
        .unwrap();
    assert_eq!(report.skipped(), 1);
    assert!(matches!(report.outcomes[0], EpisodeOutcome::Skipped { episode: 1 }));
    mock.assert_async().await;

    let forced = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1", true).unwrap();
    assert_eq!(forced.pending().count(), 1);
}

#[tokio::test]
async fn test_auth_failure_stops_batch() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_PATH)
        .with_status(403)
        .with_body(r#"{"error": {"status": "PERMISSION_DENIED"}}"#)
        .expect(1)
        .create_async()
        .await;

    let llm = llm_client(gemini_llm(false), TaskKind::Episode, &[("GEMINI_API_KEY", "bad")], &server.url());
    let plan = NovelCommandService::plan_episodes(&store, TITLE, "序章", "1-2", false).unwrap();
    let err = NovelCommandService::generate_episodes(&store, &llm, &plan, &no_progress)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ProviderAuthFailed(_)), "{:?}", err);
    mock.assert_async().await;
    assert!(!store.episode_exists(TITLE, "序章", 1));
}

#[test]
fn test_plan_rejects_unknown_arc_and_bad_ranges() {
    let temp = TempDir::new().unwrap();
    let store = store_with_project(temp.path(), TITLE, "設定");
    store
        .save_plot(TITLE, PlotDocument::from_json_str(PLOT_JSON).unwrap(), false)
        .unwrap();

    assert!(matches!(
        NovelCommandService::plan_episodes(&store, TITLE, "外伝", "1", false).unwrap_err(),
        ApiError::ArcNotFound(_)
    ));
    assert!(matches!(
        NovelCommandService::plan_episodes(&store, TITLE, "序章", "1-5", false).unwrap_err(),
        ApiError::InvalidEpisodeSpec(_)
    ));
    assert!(matches!(
        NovelCommandService::plan_episodes(&store, TITLE, "序章", "abc", false).unwrap_err(),
        ApiError::InvalidEpisodeSpec(_)
    ));
}
