use std::io::Write;

use anyhow::{Context, Result};
use chrono::Local;
use colored::Colorize;
use log::info;

use crate::config;
use crate::console::{ConsolePresenter, ConsoleReport};
use crate::datetime;
use crate::duration::human_readable;
use crate::ledger::{Billing, LedgerView};
use crate::model::{Memo, Project};
use crate::storage::{require_project, resolve_project_id, Storage};
use crate::timesheet::Timesheet;

/// `log`サブコマンドの引数。
#[derive(Debug, clap::Args)]
pub struct LogArgs {
    #[clap(
        short = 'p',
        long = "project",
        help = "id of the project to summarize. Uses the default if not specified."
    )]
    project: Option<String>,

    #[clap(long = "short", help = "Don't print the log of sessions.")]
    short: bool,

    #[clap(
        long = "time-only",
        help = "Print only the total time spent. Combine with --short for the compact format."
    )]
    time_only: bool,

    #[clap(long = "days", help = "Print a timesheet of hours worked per day.")]
    days: bool,
}

/// 1プロジェクト分の集計結果。
#[derive(Clone, Debug)]
pub struct LogReport {
    pub project: Project,
    pub currency: String,
    pub ledger: LedgerView,
    pub billing: Billing,
    pub memos: Vec<Memo>,
}

/// プロジェクトのセッションとメモを読み込み、集計する。
///
/// セッションがない場合は`EtuError::NoSessionsForProject`を返す。
pub async fn gather<T: Storage>(storage: &T, project_id: &str, now: i64) -> Result<LogReport> {
    let project = require_project(storage, project_id).await?;
    let sessions = storage
        .list_sessions(project_id)
        .await
        .with_context(|| format!("Failed to read sessions of {}", project_id))?;
    info!("{} sessions loaded for {}", sessions.len(), project_id);

    let ledger = LedgerView::new(
        project_id,
        sessions.into_iter().map(|record| record.session),
        now,
    )?;
    let memos = storage
        .list_memos(project_id)
        .await
        .with_context(|| format!("Failed to read memos of {}", project_id))?;
    let currency = config::currency(storage).await?;
    let billing = Billing::compute(&ledger, &project, &memos);

    Ok(LogReport {
        project,
        currency,
        ledger,
        billing,
        memos,
    })
}

pub struct LogCommand<'a, T: Storage> {
    storage: &'a T,
}

impl<'a, T: Storage> LogCommand<'a, T> {
    /// 新しい`LogCommand`を返す。
    pub fn new(storage: &'a T) -> Self {
        Self { storage }
    }

    /// `log`サブコマンドの処理を行う。
    ///
    /// セッション一覧(または日ごとのタイムシート)と請求額を表示する。
    pub async fn run<W: Write>(&self, args: LogArgs, writer: &mut W) -> Result<()> {
        let project_id = resolve_project_id(self.storage, args.project.as_deref()).await?;
        let now = datetime::now_millis();
        let report = gather(self.storage, &project_id, now).await?;

        if args.time_only {
            writeln!(
                writer,
                "{}",
                human_readable(report.ledger.elapsed_ms(), args.short)
            )?;
            return Ok(());
        }

        writeln!(writer, "Project {}\n", report.project.name.bold())?;
        let mut presenter = ConsoleReport::new(writer);
        if args.days {
            let timesheet = Timesheet::from_sessions(Local, report.ledger.sessions(), now);
            presenter.show_timesheet(&timesheet.days())?;
        } else if !args.short {
            presenter.show_sessions(report.ledger.sessions())?;
        }
        presenter.show_summary(&report)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use rstest::rstest;

    use super::{gather, LogArgs, LogCommand};
    use crate::datetime::mock_datetime;
    use crate::error::EtuError;
    use crate::model::{Memo, MemoKind, Project, Session, SessionRecord};
    use crate::storage::MockStorage;

    const HOUR: i64 = 3_600_000;

    fn project() -> Project {
        Project {
            slug: "acme".to_string(),
            name: "Acme".to_string(),
            rate: 50.0,
            advance: Some(2.0),
        }
    }

    fn record(id: &str, start: i64, end: Option<i64>) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            session: Session {
                name: Some(format!("work {}", id)),
                start,
                end,
            },
        }
    }

    fn storage_with(sessions: Vec<SessionRecord>, memos: Vec<Memo>) -> MockStorage {
        let mut storage = MockStorage::new();
        storage
            .expect_get_project()
            .with(eq("acme"))
            .returning(|_| Ok(Some(project())));
        storage
            .expect_list_sessions()
            .returning(move |_| Ok(sessions.clone()));
        storage
            .expect_list_memos()
            .returning(move |_| Ok(memos.clone()));
        storage
            .expect_get_config_value()
            .with(eq("currency"))
            .returning(|_| Ok(Some("$".to_string())));
        storage
    }

    #[tokio::test]
    async fn test_gather() {
        let storage = storage_with(
            vec![record("2", 4 * HOUR, None), record("1", 0, Some(2 * HOUR))],
            vec![Memo {
                id: "m".to_string(),
                name: "travel".to_string(),
                description: None,
                kind: MemoKind::Expense { cost: 20.0 },
            }],
        );

        let report = gather(&storage, "acme", 5 * HOUR).await.unwrap();

        assert_eq!(report.ledger.elapsed_ms(), 3 * HOUR);
        assert_eq!(report.ledger.sessions()[0].start, 0);
        assert_eq!(report.billing.gross, 150.0);
        assert_eq!(report.billing.final_amount, 50.0);
        assert_eq!(report.billing.final_with_expenses, 70.0);
        assert_eq!(report.currency, "$");
    }

    #[tokio::test]
    async fn test_gather_no_sessions() {
        let mut storage = MockStorage::new();
        storage
            .expect_get_project()
            .returning(|_| Ok(Some(project())));
        storage.expect_list_sessions().returning(|_| Ok(vec![]));

        let error = gather(&storage, "acme", 0).await.unwrap_err();

        assert_eq!(
            error.downcast_ref::<EtuError>(),
            Some(&EtuError::NoSessionsForProject("acme".to_string()))
        );
    }

    #[rstest]
    #[case::long(false, "3 hours\n")]
    #[case::short(true, "03h\n")]
    #[tokio::test]
    async fn test_log_time_only(#[case] short: bool, #[case] expected: &str) {
        colored::control::set_override(false);
        mock_datetime::set_mock_millis(5 * HOUR);
        let storage = storage_with(
            vec![record("1", 0, Some(2 * HOUR)), record("2", 4 * HOUR, None)],
            vec![],
        );
        let args = LogArgs {
            project: Some("acme".to_string()),
            short,
            time_only: true,
            days: false,
        };
        let mut writer = Vec::new();

        LogCommand::new(&storage).run(args, &mut writer).await.unwrap();

        assert_eq!(String::from_utf8(writer).unwrap(), expected);
        mock_datetime::clear_mock_time();
    }

    #[rstest]
    #[case::log(false, "Sessions")]
    #[case::timesheet(true, "| Month | Date | Hours |")]
    #[tokio::test]
    async fn test_log_full(#[case] days: bool, #[case] section: &str) {
        colored::control::set_override(false);
        mock_datetime::set_mock_millis(5 * HOUR);
        let storage = storage_with(vec![record("1", 0, Some(3 * HOUR))], vec![]);
        let args = LogArgs {
            project: Some("acme".to_string()),
            short: false,
            time_only: false,
            days,
        };
        let mut writer = Vec::new();

        LogCommand::new(&storage).run(args, &mut writer).await.unwrap();

        let output = String::from_utf8(writer).unwrap();
        assert!(output.starts_with("Project Acme\n\n"));
        assert!(output.contains(section));
        assert!(output.contains("Gross amount (3.00 h * $50.00/h): $150.00\n"));
        assert!(output.contains("Final amount: (3.00 h - 2 h) * $50.00/h = $50.00\n"));
        assert!(!output.contains("Advance remaining"));
        mock_datetime::clear_mock_time();
    }
}
