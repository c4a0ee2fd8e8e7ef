use chrono::{DateTime, Utc};

#[cfg(not(test))]
/// 現在のUTC時間を取得する。
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// 現在時刻をエポックからのミリ秒で取得する。
///
/// 1回のコマンド実行ではこの値を1度だけ取得し、各計算に渡す。
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}


#[cfg(test)]
pub use mock_datetime::now;
