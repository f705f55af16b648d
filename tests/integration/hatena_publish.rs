//! Hatena Blog publishing against a local AtomPub mock

use super::test_utils::store_with_project;
use mockito::{Matcher, Server};
use std::collections::HashMap;
use tempfile::TempDir;
use yumechain::config::HatenaConfig;
use yumechain::error::ApiError;
use yumechain::plot::PlotDocument;
use yumechain::publish::{EntryDraft, HatenaClient};
use yumechain::store::{EpisodeMeta, ProjectStore};

const ENTRY_RESPONSE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<entry xmlns="http://www.w3.org/2005/Atom" xmlns:app="http://www.w3.org/2007/app">
  <id>tag:blog.hatena.ne.jp,2013:blog-yume-13574176438046791234-6801883189050000000</id>
  <link rel="edit" href="https://blog.hatena.ne.jp/yume/yume.hatenablog.com/atom/entry/6801883189050000000"/>
  <link rel="alternate" type="text/html" href="https://yume.hatenablog.com/entry/2024/05/01/120000"/>
  <title>星降る街 - 序章_01</title>
</entry>"#;

const ENTRY_PATH: &str = "/yume/yume.hatenablog.com/atom/entry";

fn client(server: &Server) -> HatenaClient {
    HatenaClient::new(
        "yume".to_string(),
        "secret".to_string(),
        "yume.hatenablog.com".to_string(),
    )
    .unwrap()
    .with_base_url(server.url())
}

fn stored_story(temp: &TempDir) -> yumechain::store::StoredEpisode {
    let store = store_with_project(temp.path(), "星降る街", "設定");
    store
        .save_plot(
            "星降る街",
            PlotDocument::from_json_str(r#"{"序章": {"1": "流れ星"}}"#).unwrap(),
            false,
        )
        .unwrap();
    let meta = EpisodeMeta {
        author: "Gemini gemini-2.0-flash".to_string(),
        ..Default::default()
    };
    store
        .save_episode("星降る街", "序章", 1, "# 流れ星\n\n夜空に<光>が走った。", &meta)
        .unwrap();
    store.read_story("星降る街", "序章_01").unwrap()
}

#[tokio::test]
async fn test_publish_posts_rendered_entry() {
    let temp = TempDir::new().unwrap();
    let story = stored_story(&temp);
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", ENTRY_PATH)
        .match_header("x-wsse", Matcher::Regex(r#"^UsernameToken Username="yume", PasswordDigest=""#.to_string()))
        .match_header("content-type", "application/xml; charset=utf-8")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("<title>星降る街 - 序章_01</title>".to_string()),
            Matcher::Regex("&lt;h2&gt;流れ星&lt;/h2&gt;".to_string()),
            // Episode text is HTML-escaped once by the renderer and once for XML.
            Matcher::Regex("&amp;lt;光&amp;gt;".to_string()),
            Matcher::Regex(r#"<category term="小説" />"#.to_string()),
            Matcher::Regex("<app:draft>yes</app:draft>".to_string()),
        ]))
        .with_status(201)
        .with_header("content-type", "application/atom+xml; type=entry")
        .with_body(ENTRY_RESPONSE)
        .create_async()
        .await;

    let draft = EntryDraft::from_story("星降る街", &story, None, Some("小説, "), true);
    assert!(!draft.body.contains("author:"));
    let entry = draft.publish(&client(&server)).await.unwrap();
    mock.assert_async().await;

    assert_eq!(entry.entry_id, "6801883189050000000");
    assert_eq!(
        entry.alternate_url.as_deref(),
        Some("https://yume.hatenablog.com/entry/2024/05/01/120000")
    );
}

#[tokio::test]
async fn test_publish_rejected_credentials() {
    let temp = TempDir::new().unwrap();
    let story = stored_story(&temp);
    let mut server = Server::new_async().await;
    server
        .mock("POST", ENTRY_PATH)
        .with_status(401)
        .with_body("Unauthorized")
        .create_async()
        .await;

    let draft = EntryDraft::from_story("星降る街", &story, Some("カスタム"), None, false);
    assert_eq!(draft.title, "カスタム");
    let err = draft.publish(&client(&server)).await.unwrap_err();
    assert!(matches!(err, ApiError::PublishFailed(_)));
    assert!(err.to_string().contains(" 401"));
}

#[tokio::test]
async fn test_update_get_and_delete_entry() {
    let mut server = Server::new_async().await;
    let entry_path = format!("{}/6801883189050000000", ENTRY_PATH);
    let update = server
        .mock("PUT", entry_path.as_str())
        .match_body(Matcher::Regex("<app:draft>no</app:draft>".to_string()))
        .with_status(200)
        .with_body(ENTRY_RESPONSE)
        .create_async()
        .await;
    let get = server
        .mock("GET", entry_path.as_str())
        .with_status(200)
        .with_body(ENTRY_RESPONSE)
        .create_async()
        .await;
    let delete = server
        .mock("DELETE", entry_path.as_str())
        .with_status(200)
        .create_async()
        .await;

    let client = client(&server);
    let updated = client
        .update_entry("6801883189050000000", "新しい題", "<p>本文</p>", &[], false)
        .await
        .unwrap();
    assert_eq!(updated.entry_id, "6801883189050000000");
    let fetched = client.get_entry("6801883189050000000").await.unwrap();
    assert_eq!(fetched, updated);
    client.delete_entry("6801883189050000000").await.unwrap();

    update.assert_async().await;
    get.assert_async().await;
    delete.assert_async().await;
}

#[test]
fn test_credentials_resolve_env_over_config() {
    let config = HatenaConfig {
        username: Some("from-config".to_string()),
        blog_id: Some("config.hatenablog.com".to_string()),
        api_key: None,
    };
    let env: HashMap<String, String> = [
        ("HATENA_USERNAME".to_string(), "from-env".to_string()),
        ("HATENA_API_KEY".to_string(), "key".to_string()),
    ]
    .into();

    let credentials = config.resolve(&env).unwrap();
    assert_eq!(credentials.username, "from-env");
    assert_eq!(credentials.blog_id, "config.hatenablog.com");
    assert_eq!(credentials.api_key, "key");

    let err = HatenaConfig::default().resolve(&HashMap::<String, String>::new()).unwrap_err();
    assert!(matches!(err, ApiError::PublishNotConfigured(_)));
    assert!(err.to_string().contains("HATENA_API_KEY"));
}
