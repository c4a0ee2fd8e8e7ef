//! セッションを対話的に編集するための状態遷移。
//!
//! 遷移は副作用を持たない関数で表現し、保存は呼び出し側が`EditEffect::Persist`を受けて行う。
//!
//! ```text
//! SelectingSession -> ViewingFields -> ChoosingAction -> PromptingValue -> Validating -> Committing -> ViewingFields
//!                                            |                 ^               |
//!                                            |                 +--- rejected --+
//!                                            +-> Exited
//! ```
//!
//! 終了時刻の削除は、他に計測中のセッションがなく、対象が最新のセッションの場合に限る。

use chrono::TimeZone;

use crate::date_expr::{self, DateExprContext, EditField};
use crate::error::{DateExprError, ReopenError};
use crate::model::SessionRecord;

/// 編集メニューの項目。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditAction {
    ChangeStart,
    ChangeEnd,
    RemoveEnd,
    Rename,
    Exit,
}

impl EditAction {
    pub const ALL: [EditAction; 5] = [
        EditAction::ChangeStart,
        EditAction::ChangeEnd,
        EditAction::RemoveEnd,
        EditAction::Rename,
        EditAction::Exit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EditAction::ChangeStart => "change start time",
            EditAction::ChangeEnd => "change end time",
            EditAction::RemoveEnd => "remove end time",
            EditAction::Rename => "rename",
            EditAction::Exit => "exit",
        }
    }
}

/// 値の入力を求めている項目。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditTarget {
    Time(EditField),
    Name,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditState {
    SelectingSession,
    ViewingFields(SessionRecord),
    ChoosingAction(SessionRecord),
    PromptingValue(SessionRecord, EditTarget),
    Validating(SessionRecord, EditTarget, String),
    Committing(SessionRecord),
    Exited,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditEvent {
    /// 編集するセッションが選ばれた。
    Selected(SessionRecord),
    /// 現在の値を表示し終えた、または検証・保存を進める。
    Proceed,
    Chose(EditAction),
    Entered(String),
}

/// 呼び出し側に依頼する処理。
#[derive(Clone, Debug, PartialEq)]
pub enum EditEffect {
    Persist(SessionRecord),
    Rejected(DateExprError),
    /// 終了時刻の削除を断った。
    Refused(ReopenError),
}

/// 編集中のセッションと、同じプロジェクトの他のセッションとの関係。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionPosition {
    /// 開始時刻が最も新しい。
    pub latest: bool,
    /// 自分以外に計測中のセッションがある。
    pub other_ongoing: bool,
}

impl SessionPosition {
    /// `sessions`の中での`id`のセッションの位置を求める。
    ///
    /// 開始時刻が同じ場合は、作成順に並ぶIDの大きい方を新しいとみなす。
    pub fn of(sessions: &[SessionRecord], id: &str) -> Self {
        let Some(target) = sessions.iter().find(|record| record.id == id) else {
            return Self {
                latest: false,
                other_ongoing: sessions.iter().any(|record| record.session.is_ongoing()),
            };
        };
        let key = (target.session.start, target.id.as_str());
        let others = || sessions.iter().filter(move |record| record.id != id);

        Self {
            latest: others().all(|record| (record.session.start, record.id.as_str()) < key),
            other_ongoing: others().any(|record| record.session.is_ongoing()),
        }
    }

    fn reopen_error(self) -> Option<ReopenError> {
        if self.other_ongoing {
            Some(ReopenError::OtherSessionOngoing)
        } else if !self.latest {
            Some(ReopenError::NotLatestSession)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: EditState,
    pub effect: Option<EditEffect>,
}

impl Transition {
    fn to(state: EditState) -> Self {
        Self {
            state,
            effect: None,
        }
    }

    fn with(state: EditState, effect: EditEffect) -> Self {
        Self {
            state,
            effect: Some(effect),
        }
    }
}

/// 現在の状態とイベントから次の状態を求める。
///
/// 想定していない組み合わせのイベントは無視し、状態を変えない。
///
/// # Arguments
/// * `position` - 編集中のセッションと他のセッションとの関係。終了時刻の削除の可否に使う
pub fn transition<Tz: TimeZone>(
    tz: &Tz,
    state: EditState,
    event: EditEvent,
    now: i64,
    position: SessionPosition,
) -> Transition {
    match (state, event) {
        (EditState::SelectingSession, EditEvent::Selected(record)) => {
            Transition::to(EditState::ViewingFields(record))
        }
        (EditState::ViewingFields(record), EditEvent::Proceed) => {
            Transition::to(EditState::ChoosingAction(record))
        }
        (EditState::ChoosingAction(record), EditEvent::Chose(action)) => match action {
            EditAction::ChangeStart => Transition::to(EditState::PromptingValue(
                record,
                EditTarget::Time(EditField::Start),
            )),
            EditAction::ChangeEnd => Transition::to(EditState::PromptingValue(
                record,
                EditTarget::Time(EditField::End),
            )),
            EditAction::Rename => {
                Transition::to(EditState::PromptingValue(record, EditTarget::Name))
            }
            EditAction::RemoveEnd => match position.reopen_error() {
                Some(error) => {
                    Transition::with(EditState::ChoosingAction(record), EditEffect::Refused(error))
                }
                None => {
                    let mut record = record;
                    record.session.end = None;
                    Transition::to(EditState::Committing(record))
                }
            },
            EditAction::Exit => Transition::to(EditState::Exited),
        },
        (EditState::PromptingValue(record, target), EditEvent::Entered(input)) => {
            Transition::to(EditState::Validating(record, target, input))
        }
        (EditState::Validating(record, target, input), EditEvent::Proceed) => {
            validate(tz, record, target, &input, now)
        }
        (EditState::Committing(record), EditEvent::Proceed) => Transition::with(
            EditState::ViewingFields(record.clone()),
            EditEffect::Persist(record),
        ),
        (state, _) => Transition::to(state),
    }
}

fn validate<Tz: TimeZone>(
    tz: &Tz,
    record: SessionRecord,
    target: EditTarget,
    input: &str,
    now: i64,
) -> Transition {
    let mut updated = record.clone();
    match target {
        EditTarget::Name => {
            let name = input.trim();
            updated.session.name = (!name.is_empty()).then(|| name.to_string());
        }
        EditTarget::Time(field) => {
            let context = DateExprContext {
                field,
                start: record.session.start,
                end: record.session.end,
                now,
            };
            match date_expr::resolve(tz, &context, input) {
                Ok(millis) => match field {
                    EditField::Start => updated.session.start = millis,
                    EditField::End => updated.session.end = Some(millis),
                },
                Err(error) => {
                    return Transition::with(
                        EditState::PromptingValue(record, target),
                        EditEffect::Rejected(error),
                    )
                }
            }
        }
    }

    Transition::to(EditState::Committing(updated))
}
