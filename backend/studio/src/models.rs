//! Rows persisted by the backend store.
//!
//! Timestamps are Unix seconds, as in the rest of the store. JSON columns
//! (interface descriptors, metadata, call arguments) are stored as text and
//! read back through [`sqlx::types::Json`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;

use crate::abi::InterfaceDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub company: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub code: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub last_activity_at: i64,
    pub is_public: bool,
    pub shared_at: Option<i64>,
    pub view_count: i64,
    pub deployment_count: i64,
}

/// Fields needed to create a project row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RecordStatus {
    Success,
    Error,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompilationRecord {
    pub id: String,
    pub project_id: String,
    pub user_id: String,
    pub code_snapshot: String,
    pub status: RecordStatus,
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
    pub abi: Option<Json<InterfaceDescriptor>>,
    pub metadata: Json<Value>,
    pub created_at: i64,
}

impl CompilationRecord {
    pub fn succeeded(&self) -> bool {
        self.status == RecordStatus::Success
    }
}

#[derive(Debug, Clone)]
pub struct NewCompilation {
    pub project_id: String,
    pub user_id: String,
    pub code_snapshot: String,
    pub status: RecordStatus,
    pub exit_code: Option<i64>,
    pub stdout: String,
    pub stderr: String,
    pub abi: Option<InterfaceDescriptor>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Deployment {
    pub id: String,
    pub project_id: String,
    pub contract_address: String,
    pub chain_id: i64,
    pub chain_name: String,
    pub deployed_code: String,
    pub abi: Json<InterfaceDescriptor>,
    pub metadata: Json<Value>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub project_id: String,
    pub contract_address: String,
    pub chain_id: i64,
    pub chain_name: String,
    pub deployed_code: String,
    pub abi: InterfaceDescriptor,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AbiCallRecord {
    pub id: String,
    pub project_id: String,
    pub contract_address: String,
    pub method_name: String,
    pub method_type: String,
    pub inputs: Json<BTreeMap<String, String>>,
    pub outputs: Json<Value>,
    pub status: RecordStatus,
    pub error: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAbiCall {
    pub project_id: String,
    pub contract_address: String,
    pub method_name: String,
    pub method_type: String,
    pub inputs: BTreeMap<String, String>,
    pub outputs: Value,
    pub status: RecordStatus,
    pub error: Option<String>,
}

/// Row-update event pushed to open editor sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectChange {
    pub project: Project,
}
