//! Database layer: migrations and row-level queries for every table.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteExecutor, SqlitePoolOptions};
use sqlx::types::Json;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::errors::{Result, StudioError};
use crate::models::{
    AbiCallRecord, CompilationRecord, Deployment, NewAbiCall, NewCompilation, NewDeployment,
    NewProject, ProfileUpdate, Project, RecordStatus, User,
};

const PROJECT_COLUMNS: &str = "id, user_id, name, description, code, created_at, updated_at, \
     last_activity_at, is_public, shared_at, view_count, deployment_count";

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ─────────────────────────────────────────────────────────
// Credentials & users
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialRow {
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
}

pub async fn find_credentials<'e, E: SqliteExecutor<'e>>(
    exec: E,
    email: &str,
) -> Result<Option<CredentialRow>> {
    let row = sqlx::query_as::<_, CredentialRow>(
        "SELECT user_id, email, password_hash FROM credentials WHERE email = ?1",
    )
    .bind(email)
    .fetch_optional(exec)
    .await?;
    Ok(row)
}

pub async fn insert_credentials<'e, E: SqliteExecutor<'e>>(
    exec: E,
    user_id: &str,
    email: &str,
    password_hash: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO credentials (user_id, email, password_hash, created_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(password_hash)
    .bind(now())
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn get_user<'e, E: SqliteExecutor<'e>>(exec: E, user_id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, name, company, bio, avatar_url, created_at FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(exec)
    .await?;
    Ok(user)
}

/// Insert a profile row; returns `false` when it already existed.
pub async fn insert_user<'e, E: SqliteExecutor<'e>>(
    exec: E,
    user_id: &str,
    email: &str,
) -> Result<bool> {
    let rows = sqlx::query(
        "INSERT OR IGNORE INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
    )
    .bind(user_id)
    .bind(email)
    .bind(now())
    .execute(exec)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

pub async fn update_profile(
    pool: &SqlitePool,
    user_id: &str,
    update: &ProfileUpdate,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET    name = ?2, company = ?3, bio = ?4, avatar_url = ?5
        WHERE  id = ?1
        RETURNING id, email, name, company, bio, avatar_url, created_at
        "#,
    )
    .bind(user_id)
    .bind(&update.name)
    .bind(&update.company)
    .bind(&update.bio)
    .bind(&update.avatar_url)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StudioError::NotFound(format!("user {user_id}")))
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

pub async fn insert_project<'e, E: SqliteExecutor<'e>>(
    exec: E,
    user_id: &str,
    project: &NewProject,
) -> Result<Project> {
    let ts = now();
    let row = sqlx::query_as::<_, Project>(&format!(
        r#"
        INSERT INTO projects
            (id, user_id, name, description, code, created_at, updated_at, last_activity_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?6)
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(new_id())
    .bind(user_id)
    .bind(&project.name)
    .bind(&project.description)
    .bind(&project.code)
    .bind(ts)
    .fetch_one(exec)
    .await?;
    Ok(row)
}

pub async fn get_project(pool: &SqlitePool, project_id: &str) -> Result<Project> {
    sqlx::query_as::<_, Project>(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"
    ))
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StudioError::NotFound(format!("project {project_id}")))
}

/// A user's projects, most recently active first.
pub async fn list_projects(pool: &SqlitePool, user_id: &str) -> Result<Vec<Project>> {
    let rows = sqlx::query_as::<_, Project>(&format!(
        r#"
        SELECT {PROJECT_COLUMNS}
        FROM   projects
        WHERE  user_id = ?1
        ORDER  BY last_activity_at DESC, rowid DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

async fn update_returning(
    pool: &SqlitePool,
    project_id: &str,
    set_clause: &str,
) -> Result<Project> {
    sqlx::query_as::<_, Project>(&format!(
        "UPDATE projects SET {set_clause} WHERE id = ?1 RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(project_id)
    .bind(now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StudioError::NotFound(format!("project {project_id}")))
}

/// Replace the project's source. Last write wins.
pub async fn update_project_code(
    pool: &SqlitePool,
    project_id: &str,
    code: &str,
) -> Result<Project> {
    sqlx::query_as::<_, Project>(&format!(
        "UPDATE projects SET code = ?2, updated_at = ?3 WHERE id = ?1 RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(project_id)
    .bind(code)
    .bind(now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StudioError::NotFound(format!("project {project_id}")))
}

pub async fn rename_project(
    pool: &SqlitePool,
    project_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<Project> {
    sqlx::query_as::<_, Project>(&format!(
        r#"
        UPDATE projects
        SET    name = ?2, description = ?3, updated_at = ?4
        WHERE  id = ?1
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(project_id)
    .bind(name)
    .bind(description)
    .bind(now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StudioError::NotFound(format!("project {project_id}")))
}

/// Toggle public visibility. `shared_at` is stamped the first time a
/// project becomes public.
pub async fn set_visibility(
    pool: &SqlitePool,
    project_id: &str,
    is_public: bool,
) -> Result<Project> {
    sqlx::query_as::<_, Project>(&format!(
        r#"
        UPDATE projects
        SET    is_public = ?2,
               shared_at = CASE WHEN ?2 AND shared_at IS NULL THEN ?3 ELSE shared_at END,
               updated_at = ?3
        WHERE  id = ?1
        RETURNING {PROJECT_COLUMNS}
        "#
    ))
    .bind(project_id)
    .bind(is_public)
    .bind(now())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StudioError::NotFound(format!("project {project_id}")))
}

pub async fn touch_activity(pool: &SqlitePool, project_id: &str) -> Result<Project> {
    update_returning(pool, project_id, "last_activity_at = ?2, updated_at = ?2").await
}

/// Count a view of a public project. Private projects are untouched.
pub async fn record_view(pool: &SqlitePool, project_id: &str) -> Result<bool> {
    let rows = sqlx::query(
        "UPDATE projects SET view_count = view_count + 1 WHERE id = ?1 AND is_public = 1",
    )
    .bind(project_id)
    .execute(pool)
    .await?
    .rows_affected();
    Ok(rows == 1)
}

/// Delete a project; its history rows go with it.
pub async fn delete_project(pool: &SqlitePool, project_id: &str) -> Result<()> {
    let rows = sqlx::query("DELETE FROM projects WHERE id = ?1")
        .bind(project_id)
        .execute(pool)
        .await?
        .rows_affected();
    if rows == 0 {
        return Err(StudioError::NotFound(format!("project {project_id}")));
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Compilation history
// ─────────────────────────────────────────────────────────

const COMPILATION_COLUMNS: &str = "id, project_id, user_id, code_snapshot, status, exit_code, \
     stdout, stderr, abi, metadata, created_at";

pub async fn insert_compilation(
    pool: &SqlitePool,
    rec: &NewCompilation,
) -> Result<CompilationRecord> {
    let row = sqlx::query_as::<_, CompilationRecord>(&format!(
        r#"
        INSERT INTO compilation_history
            (id, project_id, user_id, code_snapshot, status, exit_code, stdout, stderr, abi, metadata, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        RETURNING {COMPILATION_COLUMNS}
        "#
    ))
    .bind(new_id())
    .bind(&rec.project_id)
    .bind(&rec.user_id)
    .bind(&rec.code_snapshot)
    .bind(rec.status)
    .bind(rec.exit_code)
    .bind(&rec.stdout)
    .bind(&rec.stderr)
    .bind(rec.abi.as_ref().map(Json))
    .bind(Json(&rec.metadata))
    .bind(now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Most recent compilation attempt, optionally only successful ones.
pub async fn latest_compilation(
    pool: &SqlitePool,
    project_id: &str,
    only_success: bool,
) -> Result<Option<CompilationRecord>> {
    let row = sqlx::query_as::<_, CompilationRecord>(&format!(
        r#"
        SELECT {COMPILATION_COLUMNS}
        FROM   compilation_history
        WHERE  project_id = ?1 AND (?2 = 0 OR status = ?3)
        ORDER  BY created_at DESC, rowid DESC
        LIMIT  1
        "#
    ))
    .bind(project_id)
    .bind(only_success)
    .bind(RecordStatus::Success)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn list_compilations(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Vec<CompilationRecord>> {
    let rows = sqlx::query_as::<_, CompilationRecord>(&format!(
        r#"
        SELECT {COMPILATION_COLUMNS}
        FROM   compilation_history
        WHERE  project_id = ?1
        ORDER  BY created_at DESC, rowid DESC
        "#
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Deployments
// ─────────────────────────────────────────────────────────

const DEPLOYMENT_COLUMNS: &str = "id, project_id, contract_address, chain_id, chain_name, \
     deployed_code, abi, metadata, created_at";

/// Insert a deployment and bump the project's denormalized counter.
pub async fn insert_deployment(pool: &SqlitePool, rec: &NewDeployment) -> Result<Deployment> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, Deployment>(&format!(
        r#"
        INSERT INTO deployments
            (id, project_id, contract_address, chain_id, chain_name, deployed_code, abi, metadata, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        RETURNING {DEPLOYMENT_COLUMNS}
        "#
    ))
    .bind(new_id())
    .bind(&rec.project_id)
    .bind(&rec.contract_address)
    .bind(rec.chain_id)
    .bind(&rec.chain_name)
    .bind(&rec.deployed_code)
    .bind(Json(&rec.abi))
    .bind(Json(&rec.metadata))
    .bind(now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE projects SET deployment_count = deployment_count + 1 WHERE id = ?1")
        .bind(&rec.project_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}

pub async fn list_deployments(pool: &SqlitePool, project_id: &str) -> Result<Vec<Deployment>> {
    let rows = sqlx::query_as::<_, Deployment>(&format!(
        r#"
        SELECT {DEPLOYMENT_COLUMNS}
        FROM   deployments
        WHERE  project_id = ?1
        ORDER  BY created_at DESC, rowid DESC
        "#
    ))
    .bind(project_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Interface call history
// ─────────────────────────────────────────────────────────

const ABI_CALL_COLUMNS: &str = "id, project_id, contract_address, method_name, method_type, \
     inputs, outputs, status, error, created_at";

pub async fn insert_abi_call(pool: &SqlitePool, rec: &NewAbiCall) -> Result<AbiCallRecord> {
    let row = sqlx::query_as::<_, AbiCallRecord>(&format!(
        r#"
        INSERT INTO abi_calls
            (id, project_id, contract_address, method_name, method_type, inputs, outputs, status, error, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        RETURNING {ABI_CALL_COLUMNS}
        "#
    ))
    .bind(new_id())
    .bind(&rec.project_id)
    .bind(&rec.contract_address)
    .bind(&rec.method_name)
    .bind(&rec.method_type)
    .bind(Json(&rec.inputs))
    .bind(Json(&rec.outputs))
    .bind(rec.status)
    .bind(&rec.error)
    .bind(now())
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Call history for a project, optionally narrowed to one contract.
pub async fn list_abi_calls(
    pool: &SqlitePool,
    project_id: &str,
    contract_address: Option<&str>,
) -> Result<Vec<AbiCallRecord>> {
    let rows = sqlx::query_as::<_, AbiCallRecord>(&format!(
        r#"
        SELECT {ABI_CALL_COLUMNS}
        FROM   abi_calls
        WHERE  project_id = ?1 AND (?2 IS NULL OR contract_address = ?2)
        ORDER  BY created_at DESC, rowid DESC
        "#
    ))
    .bind(project_id)
    .bind(contract_address)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
