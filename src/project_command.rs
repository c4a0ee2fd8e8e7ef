use std::io::Write;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use log::info;

use crate::config::{self, DEFAULT_PROJECT_KEY};
use crate::error::EtuError;
use crate::model::{slugify, Project};
use crate::prompt::{ask_number, parse_number, Prompter};
use crate::storage::{require_project, resolve_project_id, Storage};

/// `project`サブコマンド。
#[derive(Debug, clap::Subcommand)]
pub enum ProjectArgs {
    /// Create a new project.
    New {
        #[clap(help = "Name of the project.")]
        name: String,
        #[clap(
            short = 'r',
            long = "rate",
            help = "Hourly rate.",
            parse(try_from_str = parse_number)
        )]
        rate: f64,
        #[clap(
            short = 'a',
            long = "advance",
            help = "Hours already paid in advance.",
            parse(try_from_str = parse_number)
        )]
        advance: Option<f64>,
        #[clap(long = "id", help = "id of the project. Derived from the name if not specified.")]
        id: Option<String>,
    },
    /// List all projects.
    List,
    /// Change the default project.
    Default {
        #[clap(help = "id of the project to set as default.")]
        id: String,
    },
    /// Edit a project.
    Edit {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
    /// Delete a project, all its sessions and memos.
    Delete {
        #[clap(short = 'p', long = "project", help = PROJECT_HELP)]
        project: Option<String>,
    },
}

const PROJECT_HELP: &str = "id of the project. Uses the default if not specified.";

/// プロジェクト編集メニューの項目。
const EDIT_ACTIONS: [&str; 4] = ["change rate", "change advance", "rename", "exit"];

pub struct ProjectCommand<'a, T: Storage, P: Prompter> {
    storage: &'a T,
    prompter: &'a mut P,
}

impl<'a, T: Storage, P: Prompter> ProjectCommand<'a, T, P> {
    /// 新しい`ProjectCommand`を返す。
    pub fn new(storage: &'a T, prompter: &'a mut P) -> Self {
        Self { storage, prompter }
    }

    /// `project`サブコマンドの処理を行う。
    pub async fn run<W: Write>(&mut self, args: ProjectArgs, writer: &mut W) -> Result<()> {
        match args {
            ProjectArgs::New {
                name,
                rate,
                advance,
                id,
            } => self.create(name, rate, advance, id, writer).await,
            ProjectArgs::List => self.list(writer).await,
            ProjectArgs::Default { id } => self.set_default(&id, writer).await,
            ProjectArgs::Edit { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.edit(&id, writer).await
            }
            ProjectArgs::Delete { project } => {
                let id = resolve_project_id(self.storage, project.as_deref()).await?;
                self.delete(&id, writer).await
            }
        }
    }

    /// プロジェクトを作成する。デフォルトプロジェクトが未設定なら、作成したものをデフォルトにする。
    pub async fn create<W: Write>(
        &self,
        name: String,
        rate: f64,
        advance: Option<f64>,
        id: Option<String>,
        writer: &mut W,
    ) -> Result<()> {
        let slug = id.map(|id| slugify(&id)).unwrap_or_else(|| slugify(&name));
        if slug.is_empty() {
            bail!("Couldn't derive an id from '{}'. Pass one with --id.", name);
        }
        if self.storage.get_project(&slug).await?.is_some() {
            bail!("Project '{}' already exists.", slug);
        }

        self.storage
            .put_project(Project {
                slug: slug.clone(),
                name: name.clone(),
                rate,
                advance,
            })
            .await
            .with_context(|| format!("Failed to create project: {}", slug))?;
        writeln!(writer, "Created project {} with id {}.", name.bold(), slug)?;

        let default = self
            .storage
            .get_config_value(DEFAULT_PROJECT_KEY)
            .await
            .context("Failed to read default project")?;
        if default.is_none() {
            info!("No default project set; using {}", slug);
            self.storage
                .set_config_value(DEFAULT_PROJECT_KEY, &slug)
                .await
                .context("Failed to set default project")?;
        }

        Ok(())
    }

    /// 全てのプロジェクトを表示する。
    pub async fn list<W: Write>(&self, writer: &mut W) -> Result<()> {
        let projects = self
            .storage
            .list_projects()
            .await
            .context("Failed to read projects")?;
        if projects.is_empty() {
            writeln!(writer, "No projects found. Create one with `etu project new`.")?;
            return Ok(());
        }

        let currency = config::currency(self.storage).await?;
        for project in projects {
            let header = format!("**** {} ****", project.name);
            writeln!(writer, "{}", header)?;
            writeln!(writer, "ID: {}", project.slug)?;
            writeln!(writer, "Rate: {}{}/hr", currency, project.rate)?;
            if let Some(advance) = project.advance {
                writeln!(writer, "Paid in advance: {} h", advance)?;
            }
            writeln!(writer, "{}", "*".repeat(header.chars().count()))?;
        }

        Ok(())
    }

    /// デフォルトプロジェクトを変更する。
    pub async fn set_default<W: Write>(&self, id: &str, writer: &mut W) -> Result<()> {
        let project = self
            .storage
            .get_project(id)
            .await?
            .ok_or_else(|| EtuError::ProjectNotFound(id.to_string()))?;
        self.storage
            .set_config_value(DEFAULT_PROJECT_KEY, &project.slug)
            .await
            .context("Failed to set default project")?;

        writeln!(writer, "Default project set to {}.", project.name.bold())?;
        Ok(())
    }

    /// 単価、前払い時間、名前を対話的に変更する。
    pub async fn edit<W: Write>(&mut self, id: &str, writer: &mut W) -> Result<()> {
        let mut project = require_project(self.storage, id).await?;
        let currency = config::currency(self.storage).await?;
        let actions: Vec<String> = EDIT_ACTIONS.iter().map(|a| a.to_string()).collect();

        loop {
            writeln!(
                writer,
                "{}",
                format!("**** Current settings for project `{}` ****", project.slug).bold()
            )?;
            writeln!(writer, "{}: {}", "Name".green(), project.name)?;
            writeln!(
                writer,
                "{}: {}{}/hr",
                "Hourly rate".green(),
                currency,
                project.rate
            )?;
            writeln!(
                writer,
                "{}: {} h\n",
                "Paid in advance".green(),
                project.advance_hours()
            )?;

            let choice = self
                .prompter
                .select("What would you like to do?", &actions)?;
            match EDIT_ACTIONS[choice] {
                "change rate" => project.rate = ask_number(&mut *self.prompter, "New rate?")?,
                "change advance" => {
                    project.advance = Some(ask_number(&mut *self.prompter, "Hours paid in advance?")?)
                }
                "rename" => loop {
                    let name = self.prompter.input("New name?")?;
                    if !name.is_empty() {
                        project.name = name;
                        break;
                    }
                    self.prompter.notify("The name cannot be empty.")?;
                },
                _ => return Ok(()),
            }

            self.storage
                .put_project(project.clone())
                .await
                .with_context(|| format!("Failed to save project: {}", project.slug))?;
        }
    }

    /// 確認後にプロジェクトを削除する。
    pub async fn delete<W: Write>(&mut self, id: &str, writer: &mut W) -> Result<()> {
        let project = require_project(self.storage, id).await?;
        let message = format!(
            "THIS CANNOT BE UNDONE! Are you sure you want to delete the project {} with ID {}?",
            project.name, project.slug
        );
        if !self.prompter.confirm(&message)? {
            return Ok(());
        }

        self.storage
            .delete_project(&project.slug)
            .await
            .with_context(|| format!("Failed to delete project: {}", project.slug))?;
        writeln!(writer, "Deleted project {}.", project.name)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use mockall::predicate::eq;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::{ProjectArgs, ProjectCommand};
    use crate::error::EtuError;
    use crate::model::Project;
    use crate::prompt::scripted::ScriptedPrompter;
    use crate::storage::{JsonFileStorage, MockStorage, Storage};

    /// `project`サブコマンドだけを持つコマンドライン。
    #[derive(Debug, Parser)]
    struct Cli {
        #[clap(subcommand)]
        project: ProjectArgs,
    }

    fn temp_storage() -> (TempDir, JsonFileStorage) {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("etu.json"));
        (dir, storage)
    }

    fn prompter(input: &str) -> ScriptedPrompter {
        ScriptedPrompter::new(input)
    }

    #[rstest]
    #[case::derived_from_name("Big Client", None, "big-client")]
    #[case::explicit_id("Big Client", Some("bc"), "bc")]
    #[tokio::test]
    async fn test_create(#[case] name: &str, #[case] id: Option<&str>, #[case] expected: &str) {
        colored::control::set_override(false);
        let (_dir, storage) = temp_storage();
        let mut prompter = prompter("");
        let mut writer = Vec::new();

        let command = ProjectCommand::new(&storage, &mut prompter);
        command
            .create(
                name.to_string(),
                50.0,
                Some(2.0),
                id.map(|id| id.to_string()),
                &mut writer,
            )
            .await
            .unwrap();

        let project = storage.get_project(expected).await.unwrap().unwrap();
        assert_eq!(project.name, name);
        assert_eq!(project.advance, Some(2.0));
        assert_eq!(
            storage.get_config_value("default-project").await.unwrap(),
            Some(expected.to_string())
        );
        assert_eq!(
            String::from_utf8(writer).unwrap(),
            format!("Created project {} with id {}.\n", name, expected)
        );
    }

    #[tokio::test]
    async fn test_create_keeps_default_and_rejects_duplicate() {
        let (_dir, storage) = temp_storage();
        let mut prompter = prompter("");
        let mut writer = Vec::new();

        let command = ProjectCommand::new(&storage, &mut prompter);
        command
            .create("first".to_string(), 1.0, None, None, &mut writer)
            .await
            .unwrap();
        command
            .create("second".to_string(), 1.0, None, None, &mut writer)
            .await
            .unwrap();
        let duplicate = command
            .create("First".to_string(), 1.0, None, None, &mut writer)
            .await;

        assert!(duplicate.is_err());
        assert_eq!(
            storage.get_config_value("default-project").await.unwrap(),
            Some("first".to_string())
        );
    }

    #[tokio::test]
    async fn test_list() {
        let mut storage = MockStorage::new();
        storage.expect_list_projects().returning(|| {
            Ok(vec![Project {
                slug: "acme".to_string(),
                name: "Acme".to_string(),
                rate: 50.0,
                advance: None,
            }])
        });
        storage
            .expect_get_config_value()
            .with(eq("currency"))
            .returning(|_| Ok(Some("€".to_string())));
        let mut prompter = prompter("");
        let mut writer = Vec::new();

        ProjectCommand::new(&storage, &mut prompter)
            .list(&mut writer)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            "**** Acme ****\nID: acme\nRate: €50/hr\n**************\n"
        );
    }

    #[tokio::test]
    async fn test_list_empty() {
        let mut storage = MockStorage::new();
        storage.expect_list_projects().returning(|| Ok(vec![]));
        let mut prompter = prompter("");
        let mut writer = Vec::new();

        ProjectCommand::new(&storage, &mut prompter)
            .list(&mut writer)
            .await
            .unwrap();

        assert_eq!(
            String::from_utf8(writer).unwrap(),
            "No projects found. Create one with `etu project new`.\n"
        );
    }

    #[tokio::test]
    async fn test_set_default_not_found() {
        let mut storage = MockStorage::new();
        storage.expect_get_project().returning(|_| Ok(None));
        storage.expect_set_config_value().times(0);
        let mut prompter = prompter("");
        let mut writer = Vec::new();

        let error = ProjectCommand::new(&storage, &mut prompter)
            .set_default("nope", &mut writer)
            .await
            .unwrap_err();

        assert_eq!(
            error.downcast_ref::<EtuError>(),
            Some(&EtuError::ProjectNotFound("nope".to_string()))
        );
    }

    /// `--rate`と`--advance`は0以上の数値だけを受け付ける。
    #[rstest]
    #[case::valid(&["--rate", "50", "--advance", "2.5"], Some((50.0, Some(2.5))))]
    #[case::no_advance(&["--rate", "50"], Some((50.0, None)))]
    #[case::negative_advance(&["--rate", "50", "--advance=-1"], None)]
    #[case::negative_rate(&["--rate=-5"], None)]
    #[case::text_rate(&["--rate", "lots"], None)]
    fn test_new_args(#[case] flags: &[&str], #[case] expected: Option<(f64, Option<f64>)>) {
        let args = ["etu", "new", "Acme"].iter().chain(flags.iter()).copied();

        let parsed = Cli::try_parse_from(args).ok().map(|cli| match cli.project {
            ProjectArgs::New { rate, advance, .. } => (rate, advance),
            other => panic!("Unexpected subcommand: {:?}", other),
        });

        assert_eq!(parsed, expected);
    }

    /// 不正な数値は再入力させ、変更ごとに保存する。
    #[tokio::test]
    async fn test_edit() {
        colored::control::set_override(false);
        let (_dir, storage) = temp_storage();
        storage
            .put_project(Project {
                slug: "acme".to_string(),
                name: "Acme".to_string(),
                rate: 10.0,
                advance: None,
            })
            .await
            .unwrap();
        let mut prompter = prompter("change rate\nlots\n25\nchange advance\n4.5\nrename\n\nAcme Corp\nexit\n");
        let mut writer = Vec::new();

        ProjectCommand::new(&storage, &mut prompter)
            .edit("acme", &mut writer)
            .await
            .unwrap();

        assert_eq!(
            storage.get_project("acme").await.unwrap(),
            Some(Project {
                slug: "acme".to_string(),
                name: "Acme Corp".to_string(),
                rate: 25.0,
                advance: Some(4.5),
            })
        );
    }

    #[rstest]
    #[case::confirmed("y\n", true)]
    #[case::cancelled("n\n", false)]
    #[tokio::test]
    async fn test_delete(#[case] input: &str, #[case] deleted: bool) {
        let mut storage = MockStorage::new();
        storage.expect_get_project().returning(|_| {
            Ok(Some(Project {
                slug: "acme".to_string(),
                name: "Acme".to_string(),
                rate: 1.0,
                advance: None,
            }))
        });
        storage
            .expect_delete_project()
            .with(eq("acme"))
            .times(if deleted { 1 } else { 0 })
            .returning(|_| Ok(true));
        let mut prompter = prompter(input);
        let mut writer = Vec::new();

        ProjectCommand::new(&storage, &mut prompter)
            .delete("acme", &mut writer)
            .await
            .unwrap();
    }
}
