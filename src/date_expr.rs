//! セッション編集時に入力された日時式を解決する。
//!
//! 受け付ける形式は次の3つで、先に一致したものを採用する。
//!
//! - `now`
//! - `[now](+|-)<整数><単位>` (単位は`y`,`mo`,`w`,`d`,`h`,`m`,`s`)
//! - `yyyy-mm-dd hh:mm:ss`などの絶対日時(ローカル時刻)

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::duration::{to_milliseconds, TimeUnit};
use crate::error::DateExprError;

static DELTA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(now)?\s*([+-])\s*(\d+)\s*(mo|y|w|d|h|m|s)$").expect("delta pattern is valid")
});

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// 編集対象のフィールド。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditField {
    Start,
    End,
}

/// 日時式を解決するときの前提。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateExprContext {
    pub field: EditField,
    /// セッションの現在の開始時刻。
    pub start: i64,
    /// セッションの現在の終了時刻。
    pub end: Option<i64>,
    pub now: i64,
}

impl DateExprContext {
    /// 相対指定の基準時刻。
    ///
    /// 開始時刻の編集では終了時刻(なければ現在時刻)、終了時刻の編集では開始時刻を使う。
    fn anchor(&self) -> i64 {
        match self.field {
            EditField::Start => self.end.unwrap_or(self.now),
            EditField::End => self.start,
        }
    }

    /// 解決した時刻が制約を満たすか確認する。
    pub fn validate(&self, millis: i64) -> Result<i64, DateExprError> {
        if millis > self.now {
            return Err(DateExprError::FutureDate);
        }
        match (self.field, self.end) {
            (EditField::Start, Some(end)) if millis > end => Err(DateExprError::StartAfterEnd),
            (EditField::End, _) if millis < self.start => Err(DateExprError::EndBeforeStart),
            _ => Ok(millis),
        }
    }
}

/// 入力された日時式をタイムスタンプ(ミリ秒)に解決する。
///
/// # Arguments
///
/// * `tz` - 絶対日時を解釈するタイムゾーン
/// * `context` - 編集中のセッションと現在時刻
/// * `input` - ユーザーの入力
pub fn resolve<Tz: TimeZone>(
    tz: &Tz,
    context: &DateExprContext,
    input: &str,
) -> Result<i64, DateExprError> {
    let trimmed = input.trim();
    let millis = if trimmed == "now" {
        context.now
    } else if let Some(captures) = DELTA_PATTERN.captures(trimmed) {
        let anchor = if captures.get(1).is_some() {
            context.now
        } else {
            context.anchor()
        };
        let sign = if &captures[2] == "-" { -1 } else { 1 };
        let unit = TimeUnit::from_symbol(&captures[4])
            .ok_or_else(|| DateExprError::Unparseable(trimmed.to_string()))?;
        captures[3]
            .parse::<i64>()
            .ok()
            .and_then(|count| to_milliseconds(&[(unit, sign * count)]))
            .and_then(|delta| anchor.checked_add(delta))
            .ok_or_else(|| DateExprError::Unparseable(trimmed.to_string()))?
    } else {
        parse_absolute(tz, trimmed).ok_or_else(|| DateExprError::Unparseable(trimmed.to_string()))?
    };

    context.validate(millis)
}

/// 絶対日時をパースする。
///
/// オフセット付きのRFC 3339はそのまま、それ以外は`tz`のローカル時刻として解釈する。
fn parse_absolute<Tz: TimeZone>(tz: &Tz, s: &str) -> Option<i64> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(s) {
        return Some(datetime.timestamp_millis());
    }

    let naive = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
                .map(|date| date.and_time(NaiveTime::MIN))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|datetime| datetime.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Local, TimeZone, Utc};
    use rstest::rstest;

    use super::{resolve, DateExprContext, EditField};
    use crate::error::DateExprError;

    const HOUR: i64 = 3_600_000;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> i64 {
        Utc.with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
            .timestamp_millis()
    }

    /// 2024-06-01 09:00 から 12:00 までのセッションを、12:30 に編集する。
    fn context(field: EditField, end: Option<i64>) -> DateExprContext {
        DateExprContext {
            field,
            start: at(2024, 6, 1, 9, 0, 0),
            end,
            now: at(2024, 6, 1, 12, 30, 0),
        }
    }

    #[rstest]
    #[case::now(EditField::End, "now", Ok(at(2024, 6, 1, 12, 30, 0)))]
    #[case::now_with_spaces(EditField::End, "  now ", Ok(at(2024, 6, 1, 12, 30, 0)))]
    #[case::end_relative_to_start(EditField::End, "+2h", Ok(at(2024, 6, 1, 11, 0, 0)))]
    #[case::end_relative_to_now(EditField::End, "now-30m", Ok(at(2024, 6, 1, 12, 0, 0)))]
    #[case::end_relative_to_now_future(EditField::End, "now+2h", Err(DateExprError::FutureDate))]
    #[case::start_relative_to_end(EditField::Start, "-1h", Ok(at(2024, 6, 1, 11, 0, 0)))]
    #[case::start_after_end(EditField::Start, "now-1m", Err(DateExprError::StartAfterEnd))]
    #[case::end_before_start(EditField::End, "-1s", Err(DateExprError::EndBeforeStart))]
    #[case::month_unit(EditField::Start, "-1mo", Ok(at(2024, 6, 1, 12, 0, 0) - 30 * 24 * HOUR))]
    #[case::minute_unit(EditField::Start, "-90m", Ok(at(2024, 6, 1, 10, 30, 0)))]
    #[case::millis_not_a_delta_unit(
        EditField::Start,
        "-5ms",
        Err(DateExprError::Unparseable("-5ms".to_string()))
    )]
    #[case::delta_overflow(
        EditField::Start,
        "-999999999999y",
        Err(DateExprError::Unparseable("-999999999999y".to_string()))
    )]
    #[case::garbage(
        EditField::Start,
        "yesterday-ish",
        Err(DateExprError::Unparseable("yesterday-ish".to_string()))
    )]
    #[case::absolute(EditField::Start, "2024-06-01 08:15:00", Ok(at(2024, 6, 1, 8, 15, 0)))]
    #[case::absolute_no_seconds(EditField::End, "2024-06-01T10:45", Ok(at(2024, 6, 1, 10, 45, 0)))]
    #[case::absolute_date_only(EditField::Start, "2024-05-31", Ok(at(2024, 5, 31, 0, 0, 0)))]
    #[case::absolute_rfc3339(
        EditField::Start,
        "2024-06-01T10:00:00+02:00",
        Ok(at(2024, 6, 1, 8, 0, 0))
    )]
    #[case::absolute_future(EditField::Start, "2030-01-01 00:00:00", Err(DateExprError::FutureDate))]
    #[case::absolute_start_after_end(
        EditField::Start,
        "2024-06-01 12:10:00",
        Err(DateExprError::StartAfterEnd)
    )]
    fn test_resolve(
        #[case] field: EditField,
        #[case] input: &str,
        #[case] expected: Result<i64, DateExprError>,
    ) {
        let ctx = context(field, Some(at(2024, 6, 1, 12, 0, 0)));

        assert_eq!(resolve(&Utc, &ctx, input), expected);
    }

    /// 終了時刻がない場合、開始時刻の相対指定は現在時刻が基準になる。
    #[test]
    fn test_start_anchor_without_end() {
        let ctx = context(EditField::Start, None);

        assert_eq!(resolve(&Utc, &ctx, "-4h"), Ok(at(2024, 6, 1, 8, 30, 0)));
    }

    /// 基準時刻が検証より先に決まり、未来日付の検査が最初に行われる。
    #[test]
    fn test_future_checked_first() {
        let ctx = context(EditField::Start, Some(at(2024, 6, 1, 12, 0, 0)));

        assert_eq!(
            resolve(&Utc, &ctx, "+1d"),
            Err(DateExprError::FutureDate)
        );
    }

    #[test]
    fn test_absolute_uses_given_timezone() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let ctx = context(EditField::Start, Some(at(2024, 6, 1, 12, 0, 0)));

        assert_eq!(
            resolve(&tz, &ctx, "2024-06-01 18:00:00"),
            Ok(at(2024, 6, 1, 9, 0, 0))
        );
    }

    #[test]
    fn test_absolute_local() {
        let expected = Local
            .with_ymd_and_hms(2020, 2, 2, 10, 0, 0)
            .unwrap()
            .timestamp_millis();
        let ctx = DateExprContext {
            field: EditField::End,
            start: expected - HOUR,
            end: None,
            now: expected + HOUR,
        };

        assert_eq!(resolve(&Local, &ctx, "2020-02-02 10:00:00"), Ok(expected));
    }
}
