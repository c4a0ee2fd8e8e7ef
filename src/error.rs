use thiserror::Error;

/// etuの処理で発生するエラーの種類。
///
/// ストレージやI/Oの失敗は`anyhow::Error`として扱い、ここではユーザーに見せるべき失敗だけを表現する。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EtuError {
    #[error("No project specified and no default project set.")]
    NoDefaultProject,

    #[error("Project '{0}' does not exist.")]
    ProjectNotFound(String),

    #[error("No sessions exist for the project '{0}'.")]
    NoSessionsForProject(String),

    #[error("A session is already running for the project '{0}'.")]
    SessionAlreadyRunning(String),

    #[error("No ongoing session found for the project '{0}'.")]
    NoOngoingSession(String),

    #[error("{count} ongoing sessions found for the project '{project}'; at most one may be running. Fix them with `etu session edit`.")]
    MultipleOngoingSessions { project: String, count: usize },

    #[error(transparent)]
    InvalidDateExpression(#[from] DateExprError),

    #[error("'{0}' is not a valid number.")]
    InvalidNumericInput(String),

    #[error("'{0}' is not a valid configuration key.")]
    InvalidConfigKey(String),
}

/// 日時式の解決に失敗した理由。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateExprError {
    #[error("The selected date is in the future.")]
    FutureDate,

    #[error("The end time cannot be before the start time.")]
    EndBeforeStart,

    #[error("The start time cannot be after the end time.")]
    StartAfterEnd,

    #[error("Could not understand '{0}'. Use yyyy-mm-dd hh:mm:ss, a delta such as -2h or now-30m, or now.")]
    Unparseable(String),
}

/// セッションの終了時刻を削除できない理由。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReopenError {
    #[error("Another session is already running. Stop it before reopening this one.")]
    OtherSessionOngoing,

    #[error("Only the most recent session can be reopened.")]
    NotLatestSession,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{DateExprError, EtuError, ReopenError};

    #[rstest]
    #[case::no_default(EtuError::NoDefaultProject, "No project specified and no default project set.")]
    #[case::not_found(
        EtuError::ProjectNotFound("acme".to_string()),
        "Project 'acme' does not exist."
    )]
    #[case::date_expr(
        EtuError::InvalidDateExpression(DateExprError::FutureDate),
        "The selected date is in the future."
    )]
    fn test_display(#[case] error: EtuError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    #[case::other_ongoing(
        ReopenError::OtherSessionOngoing,
        "Another session is already running. Stop it before reopening this one."
    )]
    #[case::not_latest(ReopenError::NotLatestSession, "Only the most recent session can be reopened.")]
    fn test_reopen_display(#[case] error: ReopenError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_from_date_expr_error() {
        let error: EtuError = DateExprError::EndBeforeStart.into();

        assert_eq!(
            error,
            EtuError::InvalidDateExpression(DateExprError::EndBeforeStart)
        );
    }
}
