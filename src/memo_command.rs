use std::io::Write;

use anyhow::{Context, Result};
use log::info;

use crate::model::{Memo, MemoKind};
use crate::prompt::{ask_number, parse_number, Prompter};
use crate::storage::{new_id, resolve_project_id, Storage};

/// `memo`サブコマンド。
#[derive(Debug, clap::Subcommand)]
pub enum MemoArgs {
    /// Add a memo to a project.
    Add {
        #[clap(help = "The name of the memo. Memos can optionally have a description.")]
        name: String,
        #[clap(short = 'e', long = "expense", help = "Whether the memo indicates an expense.")]
        expense: bool,
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Edit a memo (note or expense) of a project.
    Edit {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Delete a memo (note or expense) from a project.
    Delete {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
}

const PROJECT_HELP: &str = "id of the project. Uses the default if not specified.";

/// メモの編集メニューの項目。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MemoEdit {
    Description,
    Name,
    Cost,
}

impl MemoEdit {
    fn label(self) -> &'static str {
        match self {
            MemoEdit::Description => "change description",
            MemoEdit::Name => "change memo name",
            MemoEdit::Cost => "change expense cost",
        }
    }

    /// メモの種類ごとに選べる項目。
    fn available(kind: &MemoKind) -> Vec<MemoEdit> {
        match kind {
            MemoKind::Kv => vec![MemoEdit::Description, MemoEdit::Name],
            MemoKind::Expense { .. } => vec![MemoEdit::Description, MemoEdit::Name, MemoEdit::Cost],
        }
    }
}

pub struct MemoCommand<'a, T: Storage, P: Prompter> {
    storage: &'a T,
    prompter: &'a mut P,
}

impl<'a, T: Storage, P: Prompter> MemoCommand<'a, T, P> {
    /// 新しい`MemoCommand`を返す。
    pub fn new(storage: &'a T, prompter: &'a mut P) -> Self {
        Self { storage, prompter }
    }

    /// `memo`サブコマンドの処理を行う。
    pub async fn run<W: Write>(&mut self, args: MemoArgs, writer: &mut W) -> Result<()> {
        match args {
            MemoArgs::Add {
                name,
                expense,
                project,
            } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.add(&id, name, expense, writer).await
            }
            MemoArgs::Edit { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.edit(&id, writer).await
            }
            MemoArgs::Delete { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.delete(&id, writer).await
            }
        }
    }

    /// メモを追加する。説明と、経費の場合は金額を入力させる。
    pub async fn add<W: Write>(
        &mut self,
        project_id: &str,
        name: String,
        expense: bool,
        writer: &mut W,
    ) -> Result<()> {
        let description = self
            .prompter
            .input("Memo description (optional, leave blank for none):")?;
        let kind = if expense {
            MemoKind::Expense {
                cost: ask_number(&mut *self.prompter, "Cost of expense? (number)")?,
            }
        } else {
            MemoKind::Kv
        };

        let memo = Memo {
            id: new_id(),
            name,
            description: (!description.is_empty()).then_some(description),
            kind,
        };
        let name = memo.name.clone();
        self.storage
            .put_memo(project_id, memo)
            .await
            .context("Failed to save memo")?;
        writeln!(writer, "Memo '{}' added to project '{}'.", name, project_id)?;
        Ok(())
    }

    /// メモを1つ選んで1項目を変更し、確認後に保存する。
    pub async fn edit<W: Write>(&mut self, project_id: &str, writer: &mut W) -> Result<()> {
        let Some(memo) = self
            .choose_memo(project_id, "Which memo do you want to edit?")
            .await?
        else {
            writeln!(writer, "No memos to edit.")?;
            return Ok(());
        };

        let edits = MemoEdit::available(&memo.kind);
        let labels: Vec<String> = edits.iter().map(|e| e.label().to_string()).collect();
        let choice = self.prompter.select("What do you want to do?", &labels)?;

        let mut updated = memo.clone();
        match edits[choice] {
            MemoEdit::Description => {
                let description = self
                    .prompter
                    .input("New description (leave blank to keep current):")?;
                if !description.is_empty() {
                    updated.description = Some(description);
                }
            }
            MemoEdit::Name => {
                let name = self.prompter.input(&format!(
                    "New name (leave blank to keep '{}'):",
                    memo.name
                ))?;
                if !name.is_empty() {
                    updated.name = name;
                }
            }
            MemoEdit::Cost => {
                if let MemoKind::Expense { cost } = memo.kind {
                    updated.kind = MemoKind::Expense {
                        cost: self.ask_new_cost(cost)?,
                    };
                }
            }
        }

        if self.prompter.confirm("Save changes?")? {
            self.storage
                .put_memo(project_id, updated)
                .await
                .context("Failed to save memo")?;
            writeln!(writer, "Memo updated.")?;
        } else {
            writeln!(writer, "Edit cancelled.")?;
        }
        Ok(())
    }

    /// メモを1つ選び、確認後に削除する。
    pub async fn delete<W: Write>(&mut self, project_id: &str, writer: &mut W) -> Result<()> {
        let Some(memo) = self
            .choose_memo(project_id, "Which memo do you want to delete?")
            .await?
        else {
            writeln!(writer, "No memos to delete.")?;
            return Ok(());
        };

        if self
            .prompter
            .confirm("Are you sure you want to delete this memo?")?
        {
            self.storage
                .delete_memo(project_id, &memo.id)
                .await
                .context("Failed to delete memo")?;
            info!("Deleted memo {} of {}", memo.id, project_id);
        }
        Ok(())
    }

    async fn choose_memo(&mut self, project_id: &str, message: &str) -> Result<Option<Memo>> {
        let mut memos = self
            .storage
            .list_memos(project_id)
            .await
            .context("Failed to read memos")?;
        if memos.is_empty() {
            return Ok(None);
        }

        let names: Vec<String> = memos.iter().map(|memo| memo.name.clone()).collect();
        let index = self.prompter.select(message, &names)?;
        Ok(Some(memos.swap_remove(index)))
    }

    /// 新しい金額を入力させる。空の入力は現在の金額のままにする。
    fn ask_new_cost(&mut self, current: f64) -> Result<f64> {
        let message = format!("New cost (current: {}). Leave blank to keep.", current);
        loop {
            let answer = self.prompter.input(&message)?;
            if answer.is_empty() {
                return Ok(current);
            }
            match parse_number(&answer) {
                Ok(cost) => return Ok(cost),
                Err(error) => self.prompter.notify(&error.to_string())?,
            }
        }
    }
}
