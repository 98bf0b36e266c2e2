//! Backend data client: the store plus its realtime change feed.
//!
//! Every project mutation goes through here so that open editor sessions
//! see the updated row on their subscription.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use crate::db;
use crate::editor::DocumentStore;
use crate::errors::Result;
use crate::models::{
    AbiCallRecord, CompilationRecord, Deployment, NewAbiCall, NewCompilation, NewDeployment,
    NewProject, ProfileUpdate, Project, User,
};
use crate::realtime::{ChangeFeed, ProjectSubscription};

#[derive(Debug, Clone)]
pub struct Backend {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl Backend {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
        }
    }

    /// Open (and migrate) the store at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::new(db::init_pool(database_url).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn subscribe_project(&self, project_id: &str) -> ProjectSubscription {
        self.feed.subscribe_project(project_id)
    }

    fn published(&self, project: Project) -> Project {
        self.feed.publish(project.clone());
        project
    }

    // ── Users ────────────────────────────────────────────

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        db::get_user(&self.pool, user_id).await
    }

    pub async fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<User> {
        db::update_profile(&self.pool, user_id, update).await
    }

    // ── Projects ─────────────────────────────────────────

    pub async fn create_project(&self, user_id: &str, project: &NewProject) -> Result<Project> {
        let project = db::insert_project(&self.pool, user_id, project).await?;
        debug!("Created project {} for {user_id}", project.id);
        Ok(project)
    }

    pub async fn get_project(&self, project_id: &str) -> Result<Project> {
        db::get_project(&self.pool, project_id).await
    }

    pub async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>> {
        db::list_projects(&self.pool, user_id).await
    }

    pub async fn update_code(&self, project_id: &str, code: &str) -> Result<Project> {
        let project = db::update_project_code(&self.pool, project_id, code).await?;
        Ok(self.published(project))
    }

    pub async fn rename_project(
        &self,
        project_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        let project = db::rename_project(&self.pool, project_id, name, description).await?;
        Ok(self.published(project))
    }

    pub async fn set_visibility(&self, project_id: &str, is_public: bool) -> Result<Project> {
        let project = db::set_visibility(&self.pool, project_id, is_public).await?;
        Ok(self.published(project))
    }

    pub async fn touch_activity(&self, project_id: &str) -> Result<Project> {
        let project = db::touch_activity(&self.pool, project_id).await?;
        Ok(self.published(project))
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        db::delete_project(&self.pool, project_id).await
    }

    /// Returns `false` when the project is missing or private.
    pub async fn record_view(&self, project_id: &str) -> Result<bool> {
        db::record_view(&self.pool, project_id).await
    }

    // ── History ──────────────────────────────────────────

    pub async fn record_compilation(&self, rec: &NewCompilation) -> Result<CompilationRecord> {
        db::insert_compilation(&self.pool, rec).await
    }

    pub async fn latest_compilation(&self, project_id: &str) -> Result<Option<CompilationRecord>> {
        db::latest_compilation(&self.pool, project_id, false).await
    }

    pub async fn latest_successful_compilation(
        &self,
        project_id: &str,
    ) -> Result<Option<CompilationRecord>> {
        db::latest_compilation(&self.pool, project_id, true).await
    }

    pub async fn list_compilations(&self, project_id: &str) -> Result<Vec<CompilationRecord>> {
        db::list_compilations(&self.pool, project_id).await
    }

    pub async fn record_deployment(&self, rec: &NewDeployment) -> Result<Deployment> {
        let deployment = db::insert_deployment(&self.pool, rec).await?;
        // The deployment counter on the project row changed.
        if let Ok(project) = db::get_project(&self.pool, &rec.project_id).await {
            self.feed.publish(project);
        }
        Ok(deployment)
    }

    pub async fn list_deployments(&self, project_id: &str) -> Result<Vec<Deployment>> {
        db::list_deployments(&self.pool, project_id).await
    }

    pub async fn record_abi_call(&self, rec: &NewAbiCall) -> Result<AbiCallRecord> {
        db::insert_abi_call(&self.pool, rec).await
    }

    pub async fn list_abi_calls(
        &self,
        project_id: &str,
        contract_address: Option<&str>,
    ) -> Result<Vec<AbiCallRecord>> {
        db::list_abi_calls(&self.pool, project_id, contract_address).await
    }
}

#[async_trait]
impl DocumentStore for Backend {
    async fn save(&self, project_id: &str, content: &str) -> Result<()> {
        self.update_code(project_id, content).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mutations_reach_subscribers() {
        let backend = Backend::connect("sqlite::memory:").await.unwrap();
        db::insert_user(backend.pool(), "u1", "dev@example.com").await.unwrap();
        let project = backend
            .create_project(
                "u1",
                &NewProject {
                    name: "demo".into(),
                    description: None,
                    code: String::new(),
                },
            )
            .await
            .unwrap();

        let mut sub = backend.subscribe_project(&project.id);
        backend.save(&project.id, "fn main() {}").await.unwrap();
        backend.set_visibility(&project.id, true).await.unwrap();

        assert_eq!(sub.next().await.unwrap().code, "fn main() {}");
        assert!(sub.next().await.unwrap().is_public);
    }
}
