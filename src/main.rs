mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use cli::{Cli, Command, ServeArgs};
use taskforge::api::{self, AppState};
use taskforge::db::Db;
use taskforge::infer::{FixedInference, GeminiInference, SkillInference};
use taskforge::{ops, output};

fn default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".taskforge").join("taskforge.db"))
}

fn resolve_db_path(cli_db: Option<String>) -> Result<PathBuf> {
    match cli_db {
        Some(p) => Ok(PathBuf::from(p)),
        None => default_db_path(),
    }
}

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let db = Db::create(resolve_db_path(cli.db)?)?;

    match cli.command {
        Command::Init => {
            eprintln!("Initialized {}", db.path().display());
        }

        Command::Seed => {
            let conn = db.connect()?;
            let created = ops::seed(&conn)?;
            eprintln!("Seeded skills and {created} developer(s)");
        }

        Command::List { json } => {
            let conn = db.connect()?;
            let tasks = ops::list_root_tasks(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else {
                print!("{}", output::format_task_tree(&tasks));
            }
        }

        Command::Developers { json } => {
            let conn = db.connect()?;
            let developers = ops::list_developers(&conn)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&developers)?);
            } else {
                print!("{}", output::format_developer_list(&developers));
            }
        }

        Command::Show { id, json } => {
            let conn = db.connect()?;
            let task = ops::get_task(&conn, &id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&task)?);
            } else {
                print!("{}", output::format_task_detail(&task));
            }
        }

        Command::Serve(args) => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(serve(db, args))?;
        }
    }

    Ok(())
}

fn build_inference(args: &ServeArgs) -> Arc<dyn SkillInference> {
    if let Some(names) = &args.offline_skills {
        info!("skill inference disabled, tasks without skills get {names:?}");
        return Arc::new(FixedInference(names.clone()));
    }
    if args.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set: tasks created without skills will be tagged as failed inference");
    }
    Arc::new(GeminiInference::new(
        args.gemini_api_key.clone(),
        args.gemini_model.clone(),
        Duration::from_secs(args.inference_timeout),
    ))
}

async fn serve(db: Db, args: ServeArgs) -> Result<()> {
    let inference = build_inference(&args);
    let state = AppState::new(db, inference);
    let app = api::router(state, args.static_dir.map(PathBuf::from));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;
    Ok(())
}
