use std::io::Write;

use anyhow::{bail, Context, Result};
use chrono::Local;
use log::{debug, info};

use crate::console::local_datetime;
use crate::datetime;
use crate::duration::human_readable;
use crate::error::EtuError;
use crate::model::{Session, SessionRecord};
use crate::prompt::Prompter;
use crate::session_edit::{
    transition, EditAction, EditEffect, EditEvent, EditState, EditTarget, SessionPosition,
};
use crate::storage::{require_project, resolve_project_id, Storage};

/// `session`サブコマンド。
#[derive(Debug, clap::Subcommand)]
pub enum SessionArgs {
    /// Start the clock.
    Start {
        #[clap(help = "Optional name for the session.")]
        name: Option<String>,
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Stop the clock.
    Stop {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Start a new session with the same name as the last one.
    Continue {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Edit a session of a project.
    Edit {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Delete a session of a project.
    Delete {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
}

const PROJECT_HELP: &str = "id of the project. Uses the default if not specified.";

pub struct SessionCommand<'a, T: Storage, P: Prompter> {
    storage: &'a T,
    prompter: &'a mut P,
}

impl<'a, T: Storage, P: Prompter> SessionCommand<'a, T, P> {
    /// 新しい`SessionCommand`を返す。
    ///
    /// # Arguments
    /// * `storage` - セッションを保存するストレージ
    /// * `prompter` - 編集・削除時にユーザーへ問い合わせるためのプロンプト
    pub fn new(storage: &'a T, prompter: &'a mut P) -> Self {
        Self { storage, prompter }
    }

    /// `session`サブコマンドの処理を行う。
    pub async fn run<W: Write>(&mut self, args: SessionArgs, writer: &mut W) -> Result<()> {
        match args {
            SessionArgs::Start { name, project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.start(&id, name, writer).await
            }
            SessionArgs::Stop { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.stop(&id, writer).await
            }
            SessionArgs::Continue { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.resume(&id, writer).await
            }
            SessionArgs::Edit { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.edit(&id, writer).await
            }
            SessionArgs::Delete { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.delete(&id).await
            }
        }
    }

    /// 新しいセッションを開始する。
    ///
    /// 計測中のセッションがある場合は`EtuError::SessionAlreadyRunning`を返す。
    /// 確認と書き込みの間にロックは取らない。
    pub async fn start<W: Write>(
        &self,
        project_id: &str,
        name: Option<String>,
        writer: &mut W,
    ) -> Result<()> {
        let sessions = self
            .storage
            .list_sessions(project_id)
            .await
            .context("Failed to read sessions")?;
        if sessions.iter().any(|record| record.session.is_ongoing()) {
            return Err(EtuError::SessionAlreadyRunning(project_id.to_string()).into());
        }

        let project = require_project(self.storage, project_id).await?;
        let now = datetime::now_millis();
        let session = Session {
            name,
            start: now,
            end: None,
        };
        let label = session.display_name().to_string();
        self.storage
            .put_session(project_id, session)
            .await
            .context("Failed to save session")?;

        writeln!(
            writer,
            "Started session {} in project {}. Current time: {}",
            label,
            project.name,
            local_datetime(now)
        )?;
        Ok(())
    }

    /// 最後のセッションを終了する。
    pub async fn stop<W: Write>(&self, project_id: &str, writer: &mut W) -> Result<()> {
        let last = self
            .storage
            .last_session(project_id)
            .await
            .context("Failed to read last session")?;
        let mut record = match last {
            Some(record) if record.session.is_ongoing() => record,
            _ => return Err(EtuError::NoOngoingSession(project_id.to_string()).into()),
        };

        let now = datetime::now_millis();
        record.session.end = Some(now);
        self.storage
            .write_session(project_id, &record.id, record.session.clone())
            .await
            .context("Failed to save session")?;
        info!("Stopped session {} of {}", record.id, project_id);

        writeln!(
            writer,
            "Stopped session {}. Time worked: {}",
            record.session.display_name(),
            human_readable(now - record.session.start, false)
        )?;
        Ok(())
    }

    /// 最後のセッションと同じ名前で新しいセッションを開始する。
    pub async fn resume<W: Write>(&self, project_id: &str, writer: &mut W) -> Result<()> {
        let last = self
            .storage
            .last_session(project_id)
            .await
            .context("Failed to read last session")?
            .ok_or_else(|| EtuError::NoSessionsForProject(project_id.to_string()))?;
        if last.session.is_ongoing() {
            return Err(EtuError::SessionAlreadyRunning(project_id.to_string()).into());
        }

        self.start(project_id, last.session.name, writer).await
    }

    /// 編集するセッションを選ばせ、状態遷移に従って編集する。
    pub async fn edit<W: Write>(&mut self, project_id: &str, writer: &mut W) -> Result<()> {
        let (mut sessions, index) = self
            .choose_session(project_id, "Which session do you want to edit?")
            .await?;
        let id = sessions[index].id.clone();

        let mut state = EditState::SelectingSession;
        let mut event = EditEvent::Selected(sessions[index].clone());
        loop {
            let now = datetime::now_millis();
            let position = SessionPosition::of(&sessions, &id);
            let next = transition(&Local, state, event, now, position);
            match next.effect {
                Some(EditEffect::Persist(record)) => {
                    self.storage
                        .write_session(project_id, &record.id, record.session.clone())
                        .await
                        .context("Failed to save session")?;
                    if let Some(stored) = sessions.iter_mut().find(|stored| stored.id == record.id) {
                        *stored = record;
                    }
                    writeln!(writer, "Changed successfully.")?;
                }
                Some(EditEffect::Rejected(error)) => {
                    debug!("Rejected date expression: {:?}", error);
                    self.prompter.notify(&error.to_string())?;
                }
                Some(EditEffect::Refused(error)) => {
                    debug!("Refused to reopen session {}: {:?}", id, error);
                    self.prompter.notify(&error.to_string())?;
                }
                None => {}
            }

            state = next.state;
            event = match &state {
                EditState::SelectingSession => bail!("No session selected"),
                EditState::ViewingFields(record) => {
                    show_fields(writer, &record.session, now)?;
                    EditEvent::Proceed
                }
                EditState::ChoosingAction(_) => {
                    let labels: Vec<String> = EditAction::ALL
                        .iter()
                        .map(|action| action.label().to_string())
                        .collect();
                    let index = self.prompter.select("What would you like to do?", &labels)?;
                    EditEvent::Chose(EditAction::ALL[index])
                }
                EditState::PromptingValue(_, target) => {
                    let message = match target {
                        EditTarget::Time(_) => {
                            "What should I set the time to? (yyyy-mm-dd hh:mm:ss | delta | now)"
                        }
                        EditTarget::Name => "What should the new name be?",
                    };
                    EditEvent::Entered(self.prompter.input(message)?)
                }
                EditState::Validating(..) | EditState::Committing(_) => EditEvent::Proceed,
                EditState::Exited => return Ok(()),
            };
        }
    }

    /// 削除するセッションを選ばせ、確認後に削除する。
    pub async fn delete(&mut self, project_id: &str) -> Result<()> {
        let (mut sessions, index) = self
            .choose_session(project_id, "Which session do you want to delete?")
            .await?;
        let record = sessions.swap_remove(index);
        if self
            .prompter
            .confirm("Are you sure you want to delete this session?")?
        {
            self.storage
                .delete_session(project_id, &record.id)
                .await
                .context("Failed to delete session")?;
        }

        Ok(())
    }

    /// 開始時刻順に並べたセッションと、選ばれたセッションの位置を返す。
    async fn choose_session(
        &mut self,
        project_id: &str,
        message: &str,
    ) -> Result<(Vec<SessionRecord>, usize)> {
        let mut sessions = self
            .storage
            .list_sessions(project_id)
            .await
            .context("Failed to read sessions")?;
        if sessions.is_empty() {
            return Err(EtuError::NoSessionsForProject(project_id.to_string()).into());
        }
        sessions.sort_by_key(|record| record.session.start);

        let now = datetime::now_millis();
        let labels: Vec<String> = sessions
            .iter()
            .map(|record| session_label(&record.session, now))
            .collect();
        let index = self.prompter.select(message, &labels)?;

        Ok((sessions, index))
    }
}

/// 選択肢に表示するセッションの説明。
fn session_label(session: &Session, now: i64) -> String {
    let end = match session.end {
        Some(end) => local_datetime(end),
        None => "now".to_string(),
    };
    format!(
        "{}: {} ~ {} ({})",
        session.display_name(),
        local_datetime(session.start),
        end,
        human_readable(session.duration_ms(now), true)
    )
}

fn show_fields<W: Write>(writer: &mut W, session: &Session, now: i64) -> Result<()> {
    let end = match session.end {
        Some(end) => local_datetime(end),
        None => "(ongoing session; no end time)".to_string(),
    };
    writeln!(writer, "Current values:")?;
    writeln!(writer, "- name: {}", session.display_name())?;
    writeln!(writer, "- start: {}", local_datetime(session.start))?;
    writeln!(writer, "- end: {}", end)?;
    writeln!(
        writer,
        "- duration: {}",
        human_readable(session.duration_ms(now), false)
    )?;
    Ok(())
}
