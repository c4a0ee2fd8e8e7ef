use std::io;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

mod config;
mod config_command;
mod console;
mod date_expr;
mod datetime;
mod duration;
mod error;
mod ledger;
mod log_command;
mod logger;
mod memo_command;
mod model;
mod project_command;
mod prompt;
mod session_command;
mod session_edit;
mod status_command;
mod storage;
mod timesheet;

use config_command::{ConfigArgs, ConfigCommand};
use log_command::{LogArgs, LogCommand};
use memo_command::{MemoArgs, MemoCommand};
use project_command::{ProjectArgs, ProjectCommand};
use prompt::LinePrompter;
use session_command::{SessionArgs, SessionCommand};
use status_command::{StatusArgs, StatusCommand};
use storage::JsonFileStorage;

/// プロジェクトごとの作業時間を記録し、請求額を集計するCLIアプリケーション。
///
/// # Examples
/// ```
/// $ etu project new "Acme" --rate 50
/// $ etu session start "design review"
/// $ etu session stop
/// $ etu log --days
/// ```
#[derive(Debug, Parser)]
#[clap(version, about)]
struct Args {
    #[clap(
        short = 'v',
        long = "verbose",
        parse(from_occurrences),
        global = true,
        help = "Print diagnostic logs. Repeat for more detail."
    )]
    verbose: u64,

    #[clap(subcommand)]
    subcommand: SubCommands,
}

/// サブコマンドを表す列挙型。
#[derive(Debug, Subcommand)]
enum SubCommands {
    /// Create, edit, and manage projects.
    #[clap(subcommand)]
    Project(ProjectArgs),
    /// Start, stop, edit, and delete sessions.
    #[clap(subcommand)]
    Session(SessionArgs),
    /// Print the sessions and billing summary of a project.
    Log(LogArgs),
    /// Print the status of the ongoing session, if any.
    Status(StatusArgs),
    /// Add, edit, or remove memos presented along with the project log.
    #[clap(subcommand)]
    Memo(MemoArgs),
    /// Set/get configuration values. Prints the entire config if no key is given.
    Config(ConfigArgs),
}

async fn run(args: Args) -> Result<()> {
    logger::init(args.verbose)?;

    let path = config::store_path()?;
    debug!("Using store {}", path.display());
    let storage = JsonFileStorage::new(path);
    config::setup_defaults(&storage).await?;

    let mut prompter = LinePrompter::new()?;
    let mut writer = io::stdout();

    match args.subcommand {
        SubCommands::Project(project) => {
            ProjectCommand::new(&storage, &mut prompter)
                .run(project, &mut writer)
                .await?
        }
        SubCommands::Session(session) => {
            SessionCommand::new(&storage, &mut prompter)
                .run(session, &mut writer)
                .await?
        }
        SubCommands::Log(log_args) => LogCommand::new(&storage).run(log_args, &mut writer).await?,
        SubCommands::Status(status) => {
            StatusCommand::new(&storage)
                .run(status, &mut writer)
                .await?
        }
        SubCommands::Memo(memo) => {
            MemoCommand::new(&storage, &mut prompter)
                .run(memo, &mut writer)
                .await?
        }
        SubCommands::Config(config_args) => {
            ConfigCommand::new(&storage)
                .run(config_args, &mut writer)
                .await?
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(error) = run(args).await {
        eprintln!("{} {:#}", "error:".red().bold(), error);
        process::exit(1);
    }
}
