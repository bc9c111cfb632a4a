use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::time::Duration;
use taskboard_core::{SortKey, TaskStatus, ViewCriteria};

mod board_tui;
mod cache;
mod client;
mod commands;
mod config;
mod logging;
mod runner;
mod state;

use commands::{AddArgs, EditArgs};
use config::Config;
use logging::LogTarget;
use state::Theme;

#[derive(Parser, Debug)]
#[command(name = "taskboard", version, about = "Kanban task board backed by a REST API")]
struct Cli {
    /// Override `[remote] base_url` from config.toml for this run
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive three-column board (default)
    Board,

    /// Print the board as text
    List {
        /// Only show one column (todo, in-progress, done)
        #[arg(long)]
        status: Option<TaskStatus>,

        /// Case-insensitive match on title or description
        #[arg(long)]
        search: Option<String>,

        /// Only tasks carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// title-asc, title-desc, due-asc or due-desc
        #[arg(long)]
        sort: Option<SortKey>,
    },

    /// Create a task
    Add {
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// Comma separated, e.g. "frontend, urgent"
        #[arg(long)]
        tags: Option<String>,

        #[arg(long, default_value = "todo")]
        status: TaskStatus,

        /// YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Change fields of a task (id or unique id prefix)
    Edit {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long)]
        tags: Option<String>,

        #[arg(long)]
        status: Option<TaskStatus>,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,

        #[arg(long)]
        clear_due: bool,
    },

    /// Delete a task
    Delete { id: String },

    /// Move a task to another column
    Move {
        id: String,

        status: TaskStatus,

        /// Position within the target column (default: end)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Reload tasks from the server into the local cache
    Refresh,

    /// List projects known to the server
    Projects,

    /// Show or set the board theme (light, dark)
    Theme { value: Option<Theme> },

    /// Manage ~/.taskboard/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Board);

    let target = match command {
        Command::Board => LogTarget::File(state::log_path()?),
        _ => LogTarget::Stderr,
    };
    logging::init(target)?;

    let mut cfg = config::load_config()?;
    if let Some(url) = cli.base_url {
        cfg.remote.base_url = url;
    }
    tracing::debug!(tasks_url = %cfg.remote.tasks_url(), "config loaded");

    match command {
        Command::Board => run_board(&cfg).await?,

        Command::List {
            status,
            search,
            tag,
            sort,
        } => {
            let criteria = ViewCriteria {
                status,
                search,
                tag,
                sort,
            };
            commands::list(&cfg, criteria).await?;
        }

        Command::Add {
            title,
            description,
            tags,
            status,
            due,
        } => {
            let args = AddArgs {
                title,
                description,
                tags,
                status,
                due,
            };
            commands::add(&cfg, args).await?;
        }

        Command::Edit {
            id,
            title,
            description,
            clear_description,
            tags,
            status,
            due,
            clear_due,
        } => {
            let args = EditArgs {
                title,
                description,
                clear_description,
                tags,
                status,
                due,
                clear_due,
            };
            commands::edit(&cfg, &id, args).await?;
        }

        Command::Delete { id } => commands::delete(&cfg, &id).await?,

        Command::Move { id, status, index } => {
            commands::move_task(&cfg, &id, status, index).await?;
        }

        Command::Refresh => commands::refresh(&cfg).await?,

        Command::Projects => commands::projects(&cfg).await?,

        Command::Theme { value } => {
            let mut prefs = state::read_preferences()?;
            if let Some(theme) = value {
                prefs.theme = theme;
                state::write_preferences(&prefs)?;
            }
            println!("{}", prefs.theme);
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let s = toml::to_string_pretty(&cfg).context("serialize config")?;
                println!("# {}\n{s}", config::config_path()?.display());
            }
        },
    }

    Ok(())
}

async fn run_board(cfg: &Config) -> Result<()> {
    let mut runner = commands::open_runner(cfg)?;
    let prefs = state::read_preferences()?;
    board_tui::run_board(&mut runner, prefs, commands::today(cfg))?;

    // let a just-submitted add or edit land in the cache before exiting
    if runner.in_flight() > 0 {
        println!("Waiting for {} pending request(s)...", runner.in_flight());
        if tokio::time::timeout(Duration::from_secs(5), runner.settle()).await.is_err() {
            tracing::warn!(pending = runner.in_flight(), "exiting with requests in flight");
        }
    }
    Ok(())
}
