use std::io::Write;

use anyhow::{Context, Result};
use colored::Colorize;

use crate::datetime;
use crate::duration::human_readable;
use crate::error::EtuError;
use crate::storage::{require_project, resolve_project_id, Storage};

/// `status`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct StatusArgs {
    #[clap(
        short = 'p',
        long = "project",
        help = "id of the project to check. Uses the default if not specified."
    )]
    project: Option<String>,

    #[clap(
        short = 's',
        long = "short",
        help = "Print only the time in a short format ([xx]h[yy]m[zz]s). If no session is ongoing, exit silently."
    )]
    short: bool,

    #[clap(
        long = "show-project",
        help = "For use with --short. Prints the project id along with the time spent."
    )]
    show_project: bool,
}

pub struct StatusCommand<'a, T: Storage> {
    storage: &'a T,
}

impl<'a, T: Storage> StatusCommand<'a, T> {
    /// 新しい`StatusCommand`を返す。
    pub fn new(storage: &'a T) -> Self {
        Self { storage }
    }

    /// 計測中のセッションの経過時間を表示する。
    ///
    /// `--short`の場合、計測中のセッションがなければ何も表示せずに終了する。
    pub async fn run<W: Write>(&self, args: StatusArgs, writer: &mut W) -> Result<()> {
        let project_id = resolve_project_id(self.storage, args.project.as_deref()).await?;
        let project = require_project(self.storage, &project_id).await?;
        let last = self
            .storage
            .last_session(&project_id)
            .await
            .context("Failed to read last session")?;
        let now = datetime::now_millis();

        if args.short {
            if let Some(record) = last.filter(|record| record.session.is_ongoing()) {
                let prefix = if args.show_project {
                    format!("{}:", project.slug)
                } else {
                    String::new()
                };
                writeln!(
                    writer,
                    "{}{}",
                    prefix,
                    human_readable(record.session.duration_ms(now), true)
                )?;
            }
            return Ok(());
        }

        let record = last.ok_or_else(|| EtuError::NoSessionsForProject(project_id.clone()))?;
        if !record.session.is_ongoing() {
            return Err(EtuError::NoOngoingSession(project_id).into());
        }

        writeln!(
            writer,
            "Time spent in ongoing session for project {}: {}",
            project.name.bold(),
            human_readable(record.session.duration_ms(now), false).green()
        )?;
        Ok(())
    }
}
