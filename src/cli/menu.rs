//! Interactive menu shown when no subcommand is given.
//!
//! Every entry collects arguments with dialoguer prompts and runs the same `Commands` the
//! flags would build, so the menu and the CLI share one route table.

use crate::cli::output::map_error;
use crate::cli::parse::Commands;
use crate::cli::route::RunContext;
use crate::error::ApiError;
use crate::store::ProjectStore;
use dialoguer::{Confirm, Input, Select};
use owo_colors::OwoColorize;

const MENU_ITEMS: [&str; 7] = [
    "init              新しい小説プロジェクトを初期化",
    "status            プロジェクトの状態を表示",
    "generate-plot     設定ファイルからプロットを生成",
    "generate-episode  指定した話の本文を生成",
    "read              小説をWebブラウザで読む",
    "publish           小説をはてなブログに投稿",
    "exit              終了",
];

fn input_error(e: dialoguer::Error) -> ApiError {
    ApiError::ConfigError(format!("Failed to get user input: {}", e))
}

/// Run the menu until the user exits.
pub fn run_menu(ctx: &RunContext) -> Result<(), ApiError> {
    loop {
        println!("\n{}", "YumeChain - LLMで小説を生成します".bold().cyan());
        let choice = Select::new()
            .with_prompt("選択してください")
            .items(&MENU_ITEMS)
            .default(0)
            .interact()
            .map_err(input_error)?;

        let command = match choice {
            0 => prompt_init()?,
            1 => prompt_title(ctx)?.map(|title| Commands::Status {
                title,
                format: "text".to_string(),
            }),
            2 => prompt_generate_plot(ctx)?,
            3 => prompt_generate_episode(ctx)?,
            4 => prompt_read(ctx)?,
            5 => prompt_publish(ctx)?,
            _ => {
                println!("{}", "終了します。".yellow());
                return Ok(());
            }
        };

        let Some(command) = command else {
            continue;
        };
        match ctx.execute(&command) {
            Ok(output) => println!("{}", output),
            Err(e) => eprintln!("{}", map_error(&e)),
        }
    }
}

fn prompt_init() -> Result<Option<Commands>, ApiError> {
    let title: String = Input::new()
        .with_prompt("作品名")
        .interact_text()
        .map_err(input_error)?;
    let title = title.trim().to_string();
    Ok((!title.is_empty()).then_some(Commands::Init { title }))
}

fn prompt_title(ctx: &RunContext) -> Result<Option<String>, ApiError> {
    let titles = ctx.store().list_projects()?;
    if titles.is_empty() {
        println!("{}", "小説プロジェクトがありません。先に init を実行してください。".yellow());
        return Ok(None);
    }
    let index = Select::new()
        .with_prompt("作品を選択")
        .items(&titles)
        .default(0)
        .interact()
        .map_err(input_error)?;
    Ok(titles.into_iter().nth(index))
}

fn prompt_generate_plot(ctx: &RunContext) -> Result<Option<Commands>, ApiError> {
    let Some(title) = prompt_title(ctx)? else {
        return Ok(None);
    };
    let arc: String = Input::new()
        .with_prompt("編名 (空欄で全体のプロット)")
        .allow_empty(true)
        .interact_text()
        .map_err(input_error)?;
    let arc = arc.trim();
    Ok(Some(Commands::GeneratePlot {
        title,
        arc: (!arc.is_empty()).then(|| arc.to_string()),
        dry_run: false,
    }))
}

fn prompt_generate_episode(ctx: &RunContext) -> Result<Option<Commands>, ApiError> {
    let Some(title) = prompt_title(ctx)? else {
        return Ok(None);
    };
    let plot = ctx.store().read_plot(&title)?;
    let arcs: Vec<String> = plot.arc_names().into_iter().map(str::to_string).collect();
    if arcs.is_empty() {
        println!("{}", "プロットに編がありません。先に generate-plot を実行してください。".yellow());
        return Ok(None);
    }
    let labels: Vec<String> = arcs
        .iter()
        .map(|arc| format!("{} ({}話)", arc, plot.episode_count(arc)))
        .collect();
    let index = Select::new()
        .with_prompt("編を選択")
        .items(&labels)
        .default(0)
        .interact()
        .map_err(input_error)?;
    let arc = arcs[index].clone();
    let last = plot.arc(&arc).map(|a| a.last_episode()).unwrap_or(1);

    let episodes: String = Input::new()
        .with_prompt(format!("話数 (1-{}, 例: 1, 1-3, 1,3,5)", last))
        .default("1".to_string())
        .interact_text()
        .map_err(input_error)?;
    let force = Confirm::new()
        .with_prompt("既存のエピソードを上書きしますか？")
        .default(false)
        .interact()
        .map_err(input_error)?;

    Ok(Some(Commands::GenerateEpisode {
        title,
        arc,
        episodes,
        dry_run: false,
        force,
    }))
}

fn prompt_read(ctx: &RunContext) -> Result<Option<Commands>, ApiError> {
    let Some(title) = prompt_title(ctx)? else {
        return Ok(None);
    };
    let reader = &ctx.config().reader;
    let port: u16 = Input::new()
        .with_prompt("ポート")
        .default(reader.port)
        .interact_text()
        .map_err(input_error)?;
    let auto_port = Confirm::new()
        .with_prompt("使用中なら空いているポートを探しますか？")
        .default(true)
        .interact()
        .map_err(input_error)?;
    let open_browser = Confirm::new()
        .with_prompt("ブラウザを開きますか？")
        .default(reader.open_browser)
        .interact()
        .map_err(input_error)?;

    Ok(Some(Commands::Read {
        title: Some(title),
        port: Some(port),
        auto_port,
        no_browser: !open_browser,
    }))
}

fn prompt_publish(ctx: &RunContext) -> Result<Option<Commands>, ApiError> {
    let Some(title) = prompt_title(ctx)? else {
        return Ok(None);
    };
    let stems = ctx.store().list_stories(&title)?;
    if stems.is_empty() {
        println!("{}", "投稿できるエピソードがありません。".yellow());
        return Ok(None);
    }
    let index = Select::new()
        .with_prompt("エピソードを選択")
        .items(&stems)
        .default(0)
        .interact()
        .map_err(input_error)?;
    let episode = stems[index].clone();

    let blog_title: String = Input::new()
        .with_prompt("ブログ記事のタイトル (空欄で既定)")
        .allow_empty(true)
        .interact_text()
        .map_err(input_error)?;
    let categories: String = Input::new()
        .with_prompt("カテゴリ (カンマ区切り)")
        .allow_empty(true)
        .interact_text()
        .map_err(input_error)?;
    let draft = Confirm::new()
        .with_prompt("下書きとして投稿しますか？")
        .default(false)
        .interact()
        .map_err(input_error)?;

    let non_empty = |s: String| {
        let trimmed = s.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };
    Ok(Some(Commands::Publish {
        title,
        episode: Some(episode),
        blog_title: non_empty(blog_title),
        categories: non_empty(categories),
        draft,
        preview: false,
        preview_html: false,
        yes: false,
    }))
}
