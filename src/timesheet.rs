//! セッションの時間を日ごとに振り分ける。

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone};

use crate::duration::DAY_MS;
use crate::model::Session;

/// 1日分の集計結果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimesheetDay {
    pub date: NaiveDate,
    /// その日の0時のタイムスタンプ(ミリ秒)。
    pub day_start: i64,
    pub millis: i64,
    /// 前の行と月が変わった場合だけ月名を持つ。
    pub month_label: Option<String>,
}

/// 日ごとの作業時間を積み上げる。
///
/// 1日の合計は24時間を超えないように飽和させる。
#[derive(Clone, Debug)]
pub struct Timesheet<Tz: TimeZone> {
    tz: Tz,
    buckets: BTreeMap<NaiveDate, i64>,
}

impl<Tz: TimeZone> Timesheet<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            buckets: BTreeMap::new(),
        }
    }

    /// セッションを振り分けたタイムシートを作る。
    ///
    /// 計測中のセッションは`now`を終了時刻とみなす。
    pub fn from_sessions<'a>(
        tz: Tz,
        sessions: impl IntoIterator<Item = &'a Session>,
        now: i64,
    ) -> Self {
        let mut timesheet = Self::new(tz);
        for session in sessions {
            timesheet.add_interval(session.start, session.end.unwrap_or(now));
        }
        timesheet
    }

    /// `start`から`end`までの時間を日ごとに加算する。
    pub fn add_interval(&mut self, start: i64, end: i64) {
        let start_date = self.date_of(start);
        let end_date = self.date_of(end);

        if start_date == end_date {
            self.add(start_date, end - start);
            return;
        }

        let mut day = start_date;
        while day <= end_date {
            let delta = if day == start_date {
                self.day_start(next_day(day)) - start
            } else if day == end_date {
                end - self.day_start(day)
            } else {
                DAY_MS
            };
            self.add(day, delta);
            day = next_day(day);
        }
    }

    fn add(&mut self, date: NaiveDate, delta: i64) {
        let bucket = self.buckets.entry(date).or_insert(0);
        *bucket = (*bucket + delta).min(DAY_MS);
    }

    fn date_of(&self, millis: i64) -> NaiveDate {
        self.tz
            .timestamp_millis_opt(millis)
            .earliest()
            .map(|datetime| datetime.date_naive())
            .unwrap_or(NaiveDate::MIN)
    }

    /// その日の0時(ローカル時刻)のタイムスタンプ。
    fn day_start(&self, date: NaiveDate) -> i64 {
        let midnight = date.and_time(NaiveTime::MIN);
        match self.tz.from_local_datetime(&midnight).earliest() {
            Some(datetime) => datetime.timestamp_millis(),
            // 0時が存在しない夏時間の切り替え日はUTCの値で代用する
            None => midnight.and_utc().timestamp_millis(),
        }
    }

    /// 日付と積み上げたミリ秒。
    #[cfg(test)]
    fn buckets(&self) -> &BTreeMap<NaiveDate, i64> {
        &self.buckets
    }

    #[cfg(test)]
    fn total_ms(&self) -> i64 {
        self.buckets.values().sum()
    }

    /// 日付順の行を返す。
    pub fn days(&self) -> Vec<TimesheetDay> {
        let mut current_month = None;
        self.buckets
            .iter()
            .map(|(date, millis)| {
                let month = (date.year(), date.month());
                let month_label = if current_month != Some(month) {
                    current_month = Some(month);
                    Some(date.format("%B").to_string())
                } else {
                    None
                };
                TimesheetDay {
                    date: *date,
                    day_start: self.day_start(*date),
                    millis: *millis,
                    month_label,
                }
            })
            .collect()
    }
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.succ_opt().unwrap_or(NaiveDate::MAX)
}
