//! ミリ秒と時間単位の相互変換。
//!
//! 月は30日、年は365日の固定値で換算する。暦に沿った計算は行わない。

use std::fmt;

/// 時間の単位。大きい順に並べている。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl TimeUnit {
    /// 大きい順に並べた全単位。
    pub const DESCENDING: [TimeUnit; 8] = [
        TimeUnit::Year,
        TimeUnit::Month,
        TimeUnit::Week,
        TimeUnit::Day,
        TimeUnit::Hour,
        TimeUnit::Minute,
        TimeUnit::Second,
        TimeUnit::Millisecond,
    ];

    /// 1単位あたりのミリ秒。
    pub const fn millis(self) -> i64 {
        match self {
            TimeUnit::Year => 31_536_000_000,
            TimeUnit::Month => 2_592_000_000,
            TimeUnit::Week => 604_800_000,
            TimeUnit::Day => 86_400_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Second => 1_000,
            TimeUnit::Millisecond => 1,
        }
    }

    /// 短縮表記の記号。
    pub const fn symbol(self) -> &'static str {
        match self {
            TimeUnit::Year => "y",
            TimeUnit::Month => "mo",
            TimeUnit::Week => "w",
            TimeUnit::Day => "d",
            TimeUnit::Hour => "h",
            TimeUnit::Minute => "m",
            TimeUnit::Second => "s",
            TimeUnit::Millisecond => "ms",
        }
    }

    fn name(self) -> &'static str {
        match self {
            TimeUnit::Year => "year",
            TimeUnit::Month => "month",
            TimeUnit::Week => "week",
            TimeUnit::Day => "day",
            TimeUnit::Hour => "hour",
            TimeUnit::Minute => "minute",
            TimeUnit::Second => "second",
            TimeUnit::Millisecond => "millisecond",
        }
    }

    /// 記号から単位を返す。
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::DESCENDING
            .into_iter()
            .find(|unit| unit.symbol() == symbol)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

pub const HOUR_MS: i64 = TimeUnit::Hour.millis();
pub const DAY_MS: i64 = TimeUnit::Day.millis();

/// 単位ごとの件数の合計をミリ秒で返す。
///
/// 負の件数もそのまま計算するため、差分の表現にも使える。桁あふれした場合は`None`を返す。
pub fn to_milliseconds(parts: &[(TimeUnit, i64)]) -> Option<i64> {
    parts.iter().try_fold(0_i64, |total, (unit, count)| {
        unit.millis()
            .checked_mul(*count)
            .and_then(|millis| total.checked_add(millis))
    })
}

/// ミリ秒を大きい単位から順に分解したもの。
///
/// 件数が0の単位は含まない。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurationBreakdown {
    parts: Vec<(TimeUnit, i64)>,
}

impl DurationBreakdown {
    pub fn parts(&self) -> &[(TimeUnit, i64)] {
        &self.parts
    }
}

#[cfg(test)]
impl DurationBreakdown {
    fn get(&self, unit: TimeUnit) -> Option<i64> {
        self.parts
            .iter()
            .find(|(u, _)| *u == unit)
            .map(|(_, count)| *count)
    }

    fn to_milliseconds(&self) -> Option<i64> {
        to_milliseconds(&self.parts)
    }
}

/// ミリ秒を単位ごとに分解する。
///
/// 大きい単位から順に商を取り、余りを次の単位に回す。
pub fn decompose(ms: i64) -> DurationBreakdown {
    let mut remaining = ms;
    let mut parts = Vec::new();
    for unit in TimeUnit::DESCENDING {
        if remaining >= unit.millis() {
            parts.push((unit, remaining / unit.millis()));
            remaining %= unit.millis();
        }
    }

    DurationBreakdown { parts }
}

/// ミリ秒を人が読める形式にする。
///
/// * `short` - `true`の場合は`02h15m09s`の形式、`false`の場合は`2 hours, 15 minutes and 9 seconds`の形式
///
/// どちらの形式でもミリ秒は表示しない。
pub fn human_readable(ms: i64, short: bool) -> String {
    let breakdown = decompose(ms);
    let parts = breakdown
        .parts()
        .iter()
        .filter(|(unit, _)| *unit != TimeUnit::Millisecond);

    if short {
        let text: String = parts
            .map(|(unit, count)| format!("{:02}{}", count, unit.symbol()))
            .collect();
        return if text.is_empty() {
            "00s".to_string()
        } else {
            text
        };
    }

    let items: Vec<String> = parts
        .map(|(unit, count)| {
            let plural = if *count != 1 { "s" } else { "" };
            format!("{} {}{}", count, unit.name(), plural)
        })
        .collect();
    match items.split_last() {
        None => "0 seconds".to_string(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}
