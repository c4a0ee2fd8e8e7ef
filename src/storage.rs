//! プロジェクト、セッション、メモ、設定値の保存先。
//!
//! 1つのJSONファイルにキー順のマップとして保存する。各操作は読み込みから書き込みまでを
//! ロックなしで行うため、同時に実行された別プロセスの書き込みは後勝ちになる。

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, info};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_PROJECT_KEY;
use crate::error::EtuError;
use crate::model::{Memo, Project, Session, SessionRecord};

/// etuのデータを読み書きするためのtrait。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Storage {
    /// プロジェクトのセッションを作成順に返す。
    async fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionRecord>>;

    /// 最後に作成されたセッションを返す。
    async fn last_session(&self, project_id: &str) -> Result<Option<SessionRecord>>;

    /// 新しいIDでセッションを追加し、そのIDを返す。
    async fn put_session(&self, project_id: &str, session: Session) -> Result<String>;

    /// 既存のセッションを上書きする。
    async fn write_session(&self, project_id: &str, session_id: &str, session: Session)
        -> Result<()>;

    async fn delete_session(&self, project_id: &str, session_id: &str) -> Result<()>;

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    async fn put_project(&self, project: Project) -> Result<()>;

    /// プロジェクトと、それに属するセッションとメモを削除する。
    ///
    /// 削除対象が存在しなかった場合は`false`を返す。
    async fn delete_project(&self, project_id: &str) -> Result<bool>;

    async fn get_config_value(&self, key: &str) -> Result<Option<String>>;

    async fn set_config_value(&self, key: &str, value: &str) -> Result<()>;

    async fn list_memos(&self, project_id: &str) -> Result<Vec<Memo>>;

    /// メモを追加または上書きする。
    async fn put_memo(&self, project_id: &str, memo: Memo) -> Result<()>;

    async fn delete_memo(&self, project_id: &str, memo_id: &str) -> Result<()>;
}

/// 作成順に並ぶ新しいIDを返す。
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// 操作対象のプロジェクトIDを決める。
///
/// IDが指定された場合はその存在を確認し、指定されていない場合はデフォルトプロジェクトを使う。
pub async fn resolve_project_id<T: Storage + ?Sized>(
    storage: &T,
    id: Option<&str>,
) -> Result<String> {
    let id = match id {
        Some(id) => id.to_string(),
        None => storage
            .get_config_value(DEFAULT_PROJECT_KEY)
            .await
            .context("Failed to read default project")?
            .ok_or(EtuError::NoDefaultProject)?,
    };

    let project = storage
        .get_project(&id)
        .await
        .with_context(|| format!("Failed to read project: {}", id))?;
    match project {
        Some(project) => Ok(project.slug),
        None => Err(EtuError::ProjectNotFound(id).into()),
    }
}

/// プロジェクトを取得する。存在しない場合はエラーにする。
pub async fn require_project<T: Storage + ?Sized>(storage: &T, id: &str) -> Result<Project> {
    storage
        .get_project(id)
        .await
        .with_context(|| format!("Failed to read project: {}", id))?
        .ok_or_else(|| EtuError::ProjectNotFound(id.to_string()).into())
}

/// ファイルに保存するデータ全体。
#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    config: BTreeMap<String, String>,
    #[serde(default)]
    projects: BTreeMap<String, ProjectEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectEntry {
    project: Project,
    #[serde(default)]
    sessions: BTreeMap<String, Session>,
    #[serde(default)]
    memos: BTreeMap<String, Memo>,
}

/// JSONファイルにデータを保存する`Storage`。
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// 新しい`JsonFileStorage`を返す。
    ///
    /// # Arguments
    ///
    /// * `path` - 保存先のファイル。存在しない場合は最初の書き込みで作成する
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn load(&self) -> Result<Database> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Database::default()),
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist yet", self.path.display());
                Ok(Database::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        }
    }

    async fn save(&self, database: &Database) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content =
            serde_json::to_string_pretty(database).context("Failed to serialize data")?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        Ok(())
    }

    /// データを読み込んで変更し、保存する。
    async fn update<R: Send>(
        &self,
        f: impl FnOnce(&mut Database) -> Result<R> + Send,
    ) -> Result<R> {
        let mut database = self.load().await?;
        let result = f(&mut database)?;
        self.save(&database).await?;
        Ok(result)
    }
}

fn project_entry<'a>(database: &'a mut Database, project_id: &str) -> Result<&'a mut ProjectEntry> {
    database
        .projects
        .get_mut(project_id)
        .ok_or_else(|| EtuError::ProjectNotFound(project_id.to_string()).into())
}

#[async_trait]
impl Storage for JsonFileStorage {
    async fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionRecord>> {
        let database = self.load().await?;
        let sessions: Vec<SessionRecord> = database
            .projects
            .get(project_id)
            .map(|entry| {
                entry
                    .sessions
                    .iter()
                    .map(|(id, session)| SessionRecord {
                        id: id.clone(),
                        session: session.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(sessions)
    }

    async fn last_session(&self, project_id: &str) -> Result<Option<SessionRecord>> {
        let database = self.load().await?;
        let last = database
            .projects
            .get(project_id)
            .and_then(|entry| entry.sessions.iter().next_back())
            .map(|(id, session)| SessionRecord {
                id: id.clone(),
                session: session.clone(),
            });

        Ok(last)
    }

    async fn put_session(&self, project_id: &str, session: Session) -> Result<String> {
        let id = new_id();
        let session_id = id.clone();
        self.update(move |database| {
            project_entry(database, project_id)?
                .sessions
                .insert(session_id, session);
            Ok(())
        })
        .await?;
        info!("Added session {} to project {}", id, project_id);

        Ok(id)
    }

    async fn write_session(
        &self,
        project_id: &str,
        session_id: &str,
        session: Session,
    ) -> Result<()> {
        self.update(move |database| {
            project_entry(database, project_id)?
                .sessions
                .insert(session_id.to_string(), session);
            Ok(())
        })
        .await?;
        info!("Updated session {} of project {}", session_id, project_id);

        Ok(())
    }

    async fn delete_session(&self, project_id: &str, session_id: &str) -> Result<()> {
        self.update(|database| {
            project_entry(database, project_id)?
                .sessions
                .remove(session_id);
            Ok(())
        })
        .await?;
        info!("Deleted session {} of project {}", session_id, project_id);

        Ok(())
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let database = self.load().await?;
        Ok(database
            .projects
            .get(project_id)
            .map(|entry| entry.project.clone()))
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let database = self.load().await?;
        Ok(database
            .projects
            .values()
            .map(|entry| entry.project.clone())
            .collect())
    }

    async fn put_project(&self, project: Project) -> Result<()> {
        self.update(move |database| {
            match database.projects.get_mut(&project.slug) {
                Some(entry) => entry.project = project,
                None => {
                    database.projects.insert(
                        project.slug.clone(),
                        ProjectEntry {
                            project,
                            sessions: BTreeMap::new(),
                            memos: BTreeMap::new(),
                        },
                    );
                }
            }
            Ok(())
        })
        .await
    }

    async fn delete_project(&self, project_id: &str) -> Result<bool> {
        let deleted = self
            .update(|database| {
                let removed = database.projects.remove(project_id).is_some();
                let was_default = database
                    .config
                    .get(DEFAULT_PROJECT_KEY)
                    .is_some_and(|default| default == project_id);
                if was_default {
                    database.config.remove(DEFAULT_PROJECT_KEY);
                }
                Ok(removed || was_default)
            })
            .await?;
        info!("Deleted project {}: {}", project_id, deleted);

        Ok(deleted)
    }

    async fn get_config_value(&self, key: &str) -> Result<Option<String>> {
        let database = self.load().await?;
        Ok(database.config.get(key).cloned())
    }

    async fn set_config_value(&self, key: &str, value: &str) -> Result<()> {
        self.update(|database| {
            database.config.insert(key.to_string(), value.to_string());
            Ok(())
        })
        .await
    }

    async fn list_memos(&self, project_id: &str) -> Result<Vec<Memo>> {
        let database = self.load().await?;
        Ok(database
            .projects
            .get(project_id)
            .map(|entry| entry.memos.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn put_memo(&self, project_id: &str, memo: Memo) -> Result<()> {
        self.update(move |database| {
            project_entry(database, project_id)?
                .memos
                .insert(memo.id.clone(), memo);
            Ok(())
        })
        .await
    }

    async fn delete_memo(&self, project_id: &str, memo_id: &str) -> Result<()> {
        self.update(|database| {
            project_entry(database, project_id)?.memos.remove(memo_id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use tempfile::TempDir;

    use super::{resolve_project_id, JsonFileStorage, MockStorage, Storage};
    use crate::error::EtuError;
    use crate::model::{Memo, MemoKind, Project, Session};

    fn project(slug: &str) -> Project {
        Project {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            rate: 50.0,
            advance: None,
        }
    }

    fn session(start: i64, end: Option<i64>) -> Session {
        Session {
            name: None,
            start,
            end,
        }
    }

    fn temp_storage() -> (TempDir, JsonFileStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("nested").join("etu.json"));
        (dir, storage)
    }

    #[tokio::test]
    async fn test_empty_store() {
        let (_dir, storage) = temp_storage();

        assert!(storage.list_projects().await.unwrap().is_empty());
        assert!(storage.list_sessions("none").await.unwrap().is_empty());
        assert_eq!(storage.get_config_value("currency").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sessions_keep_creation_order() {
        let (_dir, storage) = temp_storage();
        storage.put_project(project("acme")).await.unwrap();

        let first = storage
            .put_session("acme", session(500, Some(600)))
            .await
            .unwrap();
        let second = storage.put_session("acme", session(100, None)).await.unwrap();

        let sessions = storage.list_sessions("acme").await.unwrap();
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
        let last = storage.last_session("acme").await.unwrap().unwrap();
        assert_eq!(last.id, second);
        assert_eq!(last.session, session(100, None));
    }

    #[tokio::test]
    async fn test_write_and_delete_session() {
        let (_dir, storage) = temp_storage();
        storage.put_project(project("acme")).await.unwrap();
        let id = storage.put_session("acme", session(0, None)).await.unwrap();

        storage
            .write_session("acme", &id, session(0, Some(10)))
            .await
            .unwrap();
        assert_eq!(
            storage.last_session("acme").await.unwrap().unwrap().session,
            session(0, Some(10))
        );

        storage.delete_session("acme", &id).await.unwrap();
        assert!(storage.last_session("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_session_unknown_project() {
        let (_dir, storage) = temp_storage();

        let error = storage
            .put_session("ghost", session(0, None))
            .await
            .unwrap_err();

        assert_eq!(
            error.downcast_ref::<EtuError>(),
            Some(&EtuError::ProjectNotFound("ghost".to_string()))
        );
    }

    #[tokio::test]
    async fn test_put_project_keeps_sessions() {
        let (_dir, storage) = temp_storage();
        storage.put_project(project("acme")).await.unwrap();
        storage.put_session("acme", session(0, Some(1))).await.unwrap();

        let mut renamed = project("acme");
        renamed.name = "Acme Corp".to_string();
        storage.put_project(renamed.clone()).await.unwrap();

        assert_eq!(storage.get_project("acme").await.unwrap(), Some(renamed));
        assert_eq!(storage.list_sessions("acme").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_project_cascades_and_clears_default() {
        let (_dir, storage) = temp_storage();
        storage.put_project(project("acme")).await.unwrap();
        storage.put_session("acme", session(0, Some(1))).await.unwrap();
        storage
            .set_config_value("default-project", "acme")
            .await
            .unwrap();

        assert!(storage.delete_project("acme").await.unwrap());

        assert!(storage.get_project("acme").await.unwrap().is_none());
        assert!(storage.list_sessions("acme").await.unwrap().is_empty());
        assert_eq!(
            storage.get_config_value("default-project").await.unwrap(),
            None
        );
        assert!(!storage.delete_project("acme").await.unwrap());
    }

    #[tokio::test]
    async fn test_memos() {
        let (_dir, storage) = temp_storage();
        storage.put_project(project("acme")).await.unwrap();
        let memo = Memo {
            id: "m1".to_string(),
            name: "domain".to_string(),
            description: Some("yearly".to_string()),
            kind: MemoKind::Expense { cost: 12.0 },
        };

        storage.put_memo("acme", memo.clone()).await.unwrap();
        assert_eq!(storage.list_memos("acme").await.unwrap(), vec![memo]);

        storage.delete_memo("acme", "m1").await.unwrap();
        assert!(storage.list_memos("acme").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_project_id_explicit() {
        let mut storage = MockStorage::new();
        storage
            .expect_get_project()
            .with(eq("acme"))
            .returning(|id| Ok(Some(project(id))));

        let id = resolve_project_id(&storage, Some("acme")).await.unwrap();

        assert_eq!(id, "acme");
    }

    #[tokio::test]
    async fn test_resolve_project_id_default() {
        let mut storage = MockStorage::new();
        storage
            .expect_get_config_value()
            .with(eq("default-project"))
            .returning(|_| Ok(Some("acme".to_string())));
        storage
            .expect_get_project()
            .returning(|id| Ok(Some(project(id))));

        let id = resolve_project_id(&storage, None).await.unwrap();

        assert_eq!(id, "acme");
    }

    #[tokio::test]
    async fn test_resolve_project_id_no_default() {
        let mut storage = MockStorage::new();
        storage
            .expect_get_config_value()
            .returning(|_| Ok(None));

        let error = resolve_project_id(&storage, None).await.unwrap_err();

        assert_eq!(
            error.downcast_ref::<EtuError>(),
            Some(&EtuError::NoDefaultProject)
        );
    }

    #[tokio::test]
    async fn test_resolve_project_id_not_found() {
        let mut storage = MockStorage::new();
        storage.expect_get_project().returning(|_| Ok(None));

        let error = resolve_project_id(&storage, Some("ghost"))
            .await
            .unwrap_err();

        assert_eq!(
            error.downcast_ref::<EtuError>(),
            Some(&EtuError::ProjectNotFound("ghost".to_string()))
        );
    }
}
