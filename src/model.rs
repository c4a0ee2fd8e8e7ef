use serde::{Deserialize, Serialize};

/// 1回分の作業記録。
///
/// 時刻はエポックからのミリ秒。`end`が`None`の場合は計測中を表す。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub start: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<i64>,
}

impl Session {
    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }

    /// 経過時間。計測中の場合は`now`までの時間を返す。
    pub fn duration_ms(&self, now: i64) -> i64 {
        self.end.unwrap_or(now) - self.start
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("(untitled)")
    }
}

/// ストレージ上のキーを持つセッション。
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub id: String,
    pub session: Session,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub slug: String,
    pub name: String,
    /// 1時間あたりの単価。
    pub rate: f64,
    /// 前払い済みの時間数。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance: Option<f64>,
}

impl Project {
    pub fn advance_hours(&self) -> f64 {
        self.advance.unwrap_or(0.0)
    }
}

/// プロジェクトに付けるメモ。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub kind: MemoKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MemoKind {
    /// 請求書に添えるだけの情報。
    Kv,
    /// 請求額に加算される経費。
    Expense { cost: f64 },
}

impl Memo {
    /// 経費の場合はその金額を返す。
    pub fn cost(&self) -> Option<f64> {
        match self.kind {
            MemoKind::Kv => None,
            MemoKind::Expense { cost } => Some(cost),
        }
    }
}

/// 名前からプロジェクトIDを作る。
///
/// 英数字とハイフン以外は取り除き、空白はハイフンにまとめる。
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || c.is_whitespace())
        .collect();

    kept.split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
