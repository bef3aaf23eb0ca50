//! Command-line surface for the offline task list.
//!
//! # Responsibility
//! - Map `add`/`remove`/`list`/`sync` onto `offline_todo_core::OfflineTodo`.
//! - Print the visible list after every command.

use clap::{Parser, Subcommand};
use log::error;
use offline_todo_core::db::open_db;
use offline_todo_core::{
    init_logging, AppConfig, HttpRemoteService, OfflineTodo, SqliteTaskStore, Task, TaskId,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "offline-todo", version, about = "Offline-first task list")]
struct Cli {
    /// TOML config file; flags below override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Local SQLite database path.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Remote task collection URL.
    #[arg(long, global = true)]
    api: Option<String>,

    /// Absolute directory for rolling log files (stderr when unset).
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Skip synchronization on start and after mutations.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show visible tasks (default).
    List,
    /// Add a task with the given text.
    Add { text: String },
    /// Remove the task with the given id.
    Remove { id: String },
    /// Run a synchronization pass and report its outcome.
    Sync,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={}", err);
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = resolve_config(&cli)?;
    init_logging(&config.log_level, config.log_dir.as_deref())?;

    let store = Arc::new(SqliteTaskStore::try_new(open_db(&config.db_path)?)?);
    let remote = Arc::new(HttpRemoteService::new(
        &config.api_url,
        config.request_timeout(),
    )?);
    let app = OfflineTodo::new(store, remote, config.max_in_flight).with_auto_sync(!cli.offline);

    match cli.command.unwrap_or(Command::List) {
        Command::List => {
            print_tasks(&app.start().await?);
            return Ok(());
        }
        Command::Add { text } => {
            app.start().await?;
            let task = app.add(text).await?;
            println!("added {}", task.id);
        }
        Command::Remove { id } => {
            app.start().await?;
            app.remove(&TaskId::parse(&id)?).await?;
            println!("removed {id}");
        }
        Command::Sync => {
            let report = app.sync().await?;
            println!(
                "created={} deleted={} purged_gone={} pulled={} pending={} failed={}",
                report.created,
                report.deleted,
                report.purged_gone,
                report.pulled,
                report.pending,
                report.failed
            );
        }
    }

    print_tasks(&app.visible().await?);
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(api) = &cli.api {
        config.api_url = api.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    config.validate()?;
    Ok(config)
}

fn print_tasks(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("(no tasks)");
        return;
    }
    for task in tasks {
        println!("{}\t{}", task.id, task.text);
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_config, Cli, Command};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "offline-todo",
            "--db",
            "/tmp/tasks.sqlite3",
            "--api",
            "http://127.0.0.1:9000/todos",
            "add",
            "milk",
        ]);
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/tasks.sqlite3"));
        assert_eq!(config.api_url, "http://127.0.0.1:9000/todos");
        assert!(matches!(cli.command, Some(Command::Add { ref text }) if text == "milk"));
    }

    #[test]
    fn global_flags_are_accepted_after_subcommand() {
        let cli = Cli::parse_from(["offline-todo", "sync", "--offline"]);
        assert!(cli.offline);
        assert!(matches!(cli.command, Some(Command::Sync)));
    }

    #[test]
    fn relative_log_dir_is_rejected() {
        let cli = Cli::parse_from(["offline-todo", "--log-dir", "logs", "list"]);
        assert!(resolve_config(&cli).is_err());
    }
}
