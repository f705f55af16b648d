//! End-to-end CLI commands: parsed arguments routed through `RunContext`

use super::test_utils::with_isolated_env;
use clap::Parser;
use mockito::{Matcher, Server};
use serde_json::json;
use tempfile::TempDir;
use yumechain::cli::{map_error, Cli, Commands, RunContext};

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["yumechain"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command.unwrap()
}

fn context(temp: &TempDir, config: &str) -> RunContext {
    let config_path = temp.path().join("yumechain.toml");
    std::fs::write(&config_path, config).unwrap();
    with_isolated_env(temp, || RunContext::new(temp.path().to_path_buf(), Some(config_path))).unwrap()
}

fn chat_body(content: &str) -> String {
    json!({
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30}
    })
    .to_string()
}

#[test]
fn test_init_list_and_status() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp, "books_dir = \"books\"\n");

    let out = ctx.execute(&parse(&["init", "--title", "夢の鎖"])).unwrap();
    assert!(out.contains("夢の鎖"));
    assert!(temp.path().join("books/夢の鎖/setting.md").is_file());

    let out = ctx.execute(&parse(&["list"])).unwrap();
    assert!(out.contains("夢の鎖"));
    assert!(out.contains("Total: 1 project(s)"));

    let out = ctx
        .execute(&parse(&["status", "--title", "夢の鎖", "--format", "json"]))
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["title"], "夢の鎖");
    assert_eq!(value["plot"]["state"], "missing");
}

#[test]
fn test_generate_plot_then_episodes_with_openai() {
    let temp = TempDir::new().unwrap();
    let mut server = Server::new();
    let ctx = context(
        &temp,
        &format!(
            "books_dir = \"books\"\n\n[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\napi_key = \"sk-config\"\nendpoint = \"{}\"\n",
            server.url()
        ),
    );
    ctx.execute(&parse(&["init", "--title", "夢"])).unwrap();

    let plot = server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("設定資料".to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body(r#"{"序章": {"1": "目覚め", "2": "出発"}}"#))
        .expect(1)
        .create();
    let out = ctx.execute(&parse(&["generate-plot", "--title", "夢"])).unwrap();
    plot.assert();
    plot.remove();
    assert!(out.contains("Plot generated"));
    assert!(temp.path().join("books/夢/plot.json").is_file());

    let dry = ctx
        .execute(&parse(&[
            "generate-episode", "--title", "夢", "--arc", "序章", "--episodes", "1-2", "--dry-run",
        ]))
        .unwrap();
    assert!(dry.contains("2 of 2 episode(s) would be generated"));

    let episodes = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(chat_body("# 目覚め\n\n朝の光。"))
        .expect(2)
        .create();
    let out = ctx
        .execute(&parse(&[
            "generate-episode", "--title", "夢", "--arc", "序章", "--episodes", "1-2",
        ]))
        .unwrap();
    episodes.assert();
    assert!(out.contains("2 written, 0 skipped"));
    assert!(temp.path().join("books/夢/stories/序章_02.md").is_file());

    let preview = ctx
        .execute(&parse(&["publish", "--title", "夢", "--episode", "序章_01", "--preview"]))
        .unwrap();
    assert!(preview.contains("Title: 夢 - 序章_01"));
    assert!(preview.contains("朝の光。"));
}

#[test]
fn test_provider_errors_map_to_hints() {
    let temp = TempDir::new().unwrap();
    let mut server = Server::new();
    let ctx = context(
        &temp,
        &format!(
            "books_dir = \"books\"\n\n[llm]\nprovider = \"openai\"\napi_key = \"sk-bad\"\nendpoint = \"{}\"\n",
            server.url()
        ),
    );
    ctx.execute(&parse(&["init", "--title", "夢"])).unwrap();
    server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body("invalid api key")
        .create();

    let err = ctx
        .execute(&parse(&["generate-plot", "--title", "夢"]))
        .unwrap_err();
    let message = map_error(&err);
    assert!(message.starts_with("Error: Provider authentication failed"));
    assert!(message.contains("Hint:"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("bad.toml");
    std::fs::write(&config_path, "[llm]\ntemperature = 5.0\n").unwrap();

    let err = with_isolated_env(&temp, || {
        RunContext::new(temp.path().to_path_buf(), Some(config_path))
    })
    .err()
    .unwrap();
    assert!(err.to_string().contains("temperature"));
}

#[test]
fn test_unknown_project_reports_init_hint() {
    let temp = TempDir::new().unwrap();
    let ctx = context(&temp, "books_dir = \"books\"\n");

    let err = ctx
        .execute(&parse(&["generate-plot", "--title", "ない", "--dry-run"]))
        .unwrap_err();
    assert!(map_error(&err).contains("yumechain init --title ない"));
}
