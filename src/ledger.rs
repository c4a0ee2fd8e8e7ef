//! プロジェクトのセッションを集計し、請求額を計算する。

use crate::duration::HOUR_MS;
use crate::error::EtuError;
use crate::model::{Memo, Project, Session};

/// セッション一覧を集計したもの。
///
/// 計測中のセッションは高々1つとし、複数ある場合はエラーにする。
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerView {
    sessions: Vec<Session>,
    ongoing: Option<Session>,
    closed_ms: i64,
    ongoing_ms: i64,
}

impl LedgerView {
    /// セッションを集計する。
    ///
    /// # Arguments
    ///
    /// * `project_id` - エラーメッセージに使うプロジェクトID
    /// * `sessions` - 集計するセッション。順序は問わない
    /// * `now` - 現在時刻(ミリ秒)。計測中セッションの経過時間に使う
    pub fn new(
        project_id: &str,
        sessions: impl IntoIterator<Item = Session>,
        now: i64,
    ) -> Result<Self, EtuError> {
        let mut sessions: Vec<Session> = sessions.into_iter().collect();
        if sessions.is_empty() {
            return Err(EtuError::NoSessionsForProject(project_id.to_string()));
        }
        sessions.sort_by_key(|session| session.start);

        let mut ongoing = sessions.iter().filter(|session| session.is_ongoing());
        let current = ongoing.next().cloned();
        let extra = ongoing.count();
        if extra > 0 {
            return Err(EtuError::MultipleOngoingSessions {
                project: project_id.to_string(),
                count: extra + 1,
            });
        }

        let closed_ms = sessions
            .iter()
            .filter_map(|session| session.end.map(|end| end - session.start))
            .sum();
        let ongoing_ms = current
            .as_ref()
            .map(|session| now - session.start)
            .unwrap_or(0);

        Ok(Self {
            sessions,
            ongoing: current,
            closed_ms,
            ongoing_ms,
        })
    }

    /// 開始時刻順のセッション。
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn ongoing(&self) -> Option<&Session> {
        self.ongoing.as_ref()
    }

    #[cfg(test)]
    fn closed_ms(&self) -> i64 {
        self.closed_ms
    }

    pub fn ongoing_ms(&self) -> i64 {
        self.ongoing_ms
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.closed_ms + self.ongoing_ms
    }

    /// 丸めていない時間数。
    pub fn decimal_hours(&self) -> f64 {
        self.elapsed_ms() as f64 / HOUR_MS as f64
    }
}

/// 請求額の計算結果。
///
/// 金額は小数点以下2桁に丸めている。
#[derive(Clone, Debug, PartialEq)]
pub struct Billing {
    pub decimal_hours: f64,
    pub rate: f64,
    pub gross: f64,
    pub advance_hours: f64,
    /// 前払い時間の残り。負の場合は使い切っている。
    pub advance_remaining_ms: i64,
    pub final_amount: f64,
    pub total_expenses: f64,
    pub final_with_expenses: f64,
}

impl Billing {
    /// 集計結果とプロジェクト設定、メモから請求額を計算する。
    pub fn compute(ledger: &LedgerView, project: &Project, memos: &[Memo]) -> Self {
        let decimal_hours = ledger.decimal_hours();
        let advance_hours = project.advance_hours();
        let advance_ms = (advance_hours * HOUR_MS as f64).round() as i64;

        let final_amount = round2((decimal_hours - advance_hours) * project.rate);
        let total_expenses = round2(memos.iter().filter_map(Memo::cost).sum());

        Self {
            decimal_hours,
            rate: project.rate,
            gross: round2(decimal_hours * project.rate),
            advance_hours,
            advance_remaining_ms: advance_ms - ledger.elapsed_ms(),
            final_amount,
            total_expenses,
            final_with_expenses: round2(final_amount + total_expenses),
        }
    }

    /// 前払いが残っている場合だけ残り時間を返す。
    pub fn advance_remaining(&self) -> Option<i64> {
        (self.advance_remaining_ms > 0).then_some(self.advance_remaining_ms)
    }

    /// 表示用に丸めた時間数。
    pub fn display_hours(&self) -> f64 {
        round2(self.decimal_hours)
    }
}

/// 小数点以下2桁に丸める。
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
