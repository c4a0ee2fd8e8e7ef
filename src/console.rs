use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use colored::Colorize;

use crate::duration::human_readable;
use crate::log_command::LogReport;
use crate::model::{Memo, MemoKind, Session};
use crate::timesheet::TimesheetDay;

/// Consoleに集計結果を表示するためのtrait。
pub trait ConsolePresenter {
    /// 終了済みのセッションを開始時刻順に表示する。
    ///
    /// # Arguments
    ///
    /// * `sessions` - 表示するセッション。計測中のものは表示しない
    fn show_sessions(&mut self, sessions: &[Session]) -> Result<()>;

    /// 日ごとの作業時間を表示する。
    fn show_timesheet(&mut self, days: &[TimesheetDay]) -> Result<()>;

    /// 経費、合計時間、請求額、メモを表示する。
    fn show_summary(&mut self, report: &LogReport) -> Result<()>;
}

/// 集計結果をMarkdownに近い形式で表示する。
pub struct ConsoleReport<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleReport<'a, W> {
    /// 新しい`ConsoleReport`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }
}

/// ローカル時刻の`YYYY-MM-DD HH:MM`形式にする。
pub fn local_datetime(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .earliest()
        .map(|datetime| datetime.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn money(currency: &str, amount: f64) -> String {
    format!("{}{:.2}", currency, amount)
}

impl<'a, W: Write> ConsolePresenter for ConsoleReport<'a, W> {
    fn show_sessions(&mut self, sessions: &[Session]) -> Result<()> {
        let mut sorted_sessions = sessions.to_vec();
        sorted_sessions.sort_by_key(|session| session.start);

        writeln!(self.writer, "{}", "Sessions".bold()).context("Failed to write heading")?;
        let closed: Vec<&Session> = sorted_sessions
            .iter()
            .filter(|session| !session.is_ongoing())
            .collect();
        let width = closed.len().to_string().len();
        for (i, session) in closed.iter().enumerate() {
            writeln!(
                self.writer,
                "- {:0width$} {}: {} ({})",
                i + 1,
                session.display_name(),
                local_datetime(session.start),
                human_readable(session.end.unwrap_or(session.start) - session.start, true),
                width = width,
            )
            .with_context(|| format!("Failed to write session: {:?}", session))?;
        }
        writeln!(self.writer).context("Failed to write newline")?;

        Ok(())
    }

    fn show_timesheet(&mut self, days: &[TimesheetDay]) -> Result<()> {
        writeln!(self.writer, "| Month | Date | Hours |").context("Failed to write header")?;
        writeln!(self.writer, "| --- | --- | --- |").context("Failed to write header")?;
        for day in days {
            writeln!(
                self.writer,
                "| {} | {} | {} |",
                day.month_label.as_deref().unwrap_or(""),
                day.date.format("%d/%m/%Y"),
                human_readable(day.millis, true),
            )
            .with_context(|| format!("Failed to write timesheet row: {}", day.date))?;
        }
        writeln!(self.writer).context("Failed to write newline")?;

        Ok(())
    }

    fn show_summary(&mut self, report: &LogReport) -> Result<()> {
        let currency = report.currency.as_str();
        let billing = &report.billing;

        let expenses: Vec<(&Memo, f64)> = report
            .memos
            .iter()
            .filter_map(|memo| memo.cost().map(|cost| (memo, cost)))
            .collect();
        if !expenses.is_empty() {
            writeln!(self.writer, "Expenses:")?;
            for (memo, cost) in expenses {
                let description = memo
                    .description
                    .as_deref()
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default();
                writeln!(
                    self.writer,
                    "* {}: {}{}",
                    memo.name,
                    money(currency, cost),
                    description
                )?;
            }
            writeln!(self.writer)?;
        }

        if let Some(current) = report.ledger.ongoing() {
            writeln!(self.writer, "Current session: {}", current.display_name())?;
            writeln!(self.writer, "Started at: {}", local_datetime(current.start))?;
            writeln!(
                self.writer,
                "Time spent in current session: {}\n",
                human_readable(report.ledger.ongoing_ms(), false)
            )?;
        }

        let hours = format!("{:.2} h", billing.display_hours());
        writeln!(
            self.writer,
            "Total time spent: {} = {}\n",
            human_readable(report.ledger.elapsed_ms(), false).bold(),
            hours
        )?;
        writeln!(
            self.writer,
            "Gross amount ({} * {}/h): {}",
            hours,
            money(currency, billing.rate),
            money(currency, billing.gross)
        )?;
        writeln!(
            self.writer,
            "Hours paid in advance: {} h",
            billing.advance_hours
        )?;
        if let Some(remaining) = billing.advance_remaining() {
            writeln!(
                self.writer,
                "Advance remaining: {}",
                human_readable(remaining, false)
            )?;
        }
        let expenses_part = if billing.total_expenses != 0.0 {
            format!(" + {} (Expenses)", money(currency, billing.total_expenses))
        } else {
            String::new()
        };
        writeln!(
            self.writer,
            "Final amount: ({} - {} h) * {}/h{} = {}",
            hours,
            billing.advance_hours,
            money(currency, billing.rate),
            expenses_part,
            money(currency, billing.final_with_expenses).bold()
        )?;

        let notes: Vec<&Memo> = report
            .memos
            .iter()
            .filter(|memo| matches!(memo.kind, MemoKind::Kv))
            .collect();
        if !notes.is_empty() {
            writeln!(self.writer, "\nMemos")?;
            for memo in notes {
                writeln!(
                    self.writer,
                    "* {} = {}",
                    memo.name,
                    memo.description.as_deref().unwrap_or("")
                )?;
            }
        }

        Ok(())
    }
}
