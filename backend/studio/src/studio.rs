//! IDE workflows over the backend, compiler and ledger clients.
//!
//! Every data-mutating action surfaces its outcome as a toast. Compile and
//! invoke attempts are always recorded in history, failures included.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::abi::{self, AbiEntry, AbiValue};
use crate::auth::{self, Session, SignInStatus};
use crate::backend::Backend;
use crate::compiler::{CompileOutcome, RemoteApi};
use crate::config::Config;
use crate::editor::{EditorSession, LanguageRegistry, SessionOptions};
use crate::errors::{Result, StudioError};
use crate::ledger::{InvokeOutcome, LedgerClient};
use crate::models::{
    Deployment, NewAbiCall, NewCompilation, NewDeployment, NewProject, Project, RecordStatus,
};
use crate::notify::Notifier;
use crate::rpc::RpcClient;
use crate::templates::{self, Template};

const BLANK_PROJECT_CODE: &str = "// Start writing your Stylus contract here\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Verified,
    Unverified,
}

/// Application context: one per running IDE.
#[derive(Debug, Clone)]
pub struct Studio {
    backend: Backend,
    compiler: RemoteApi,
    ledger: LedgerClient,
    notifier: Notifier,
    languages: LanguageRegistry,
    autosave_delay: std::time::Duration,
}

impl Studio {
    pub fn new(
        backend: Backend,
        compiler: RemoteApi,
        ledger: LedgerClient,
        notifier: Notifier,
    ) -> Self {
        Self {
            backend,
            compiler,
            ledger,
            notifier,
            languages: LanguageRegistry::new(),
            autosave_delay: crate::editor::sync::DEFAULT_AUTOSAVE_DELAY,
        }
    }

    pub fn from_config(config: &Config, backend: Backend, client: reqwest::Client) -> Self {
        let remote = RemoteApi::new(client.clone(), &config.api_url, &config.api_key);
        let ledger = LedgerClient::new(
            RpcClient::new(client, &config.chain.rpc_url),
            config.chain.clone(),
            remote.clone(),
            config.wallet_address.clone(),
            config.receipt_timeout(),
        );
        let mut studio = Self::new(backend, remote, ledger, Notifier::new());
        studio.autosave_delay = config.autosave_delay();
        studio
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn templates(&self) -> &'static [Template] {
        templates::TEMPLATES
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(Session, SignInStatus)> {
        auth::sign_in(&self.backend, email, password).await
    }

    /// A project the session may edit.
    async fn owned_project(&self, session: &Session, project_id: &str) -> Result<Project> {
        let project = self.backend.get_project(project_id).await?;
        if project.user_id != session.user_id {
            return Err(StudioError::NotFound(format!("project {project_id}")));
        }
        Ok(project)
    }

    // ── Projects ─────────────────────────────────────────

    /// Create a project, optionally from a catalogue template. Name and
    /// description are validated before anything is written.
    pub async fn create_project(
        &self,
        session: &Session,
        name: &str,
        description: Option<&str>,
        template: Option<&str>,
    ) -> Result<Project> {
        templates::validate_project_name(name)?;
        templates::validate_description(description)?;
        let code = match template {
            Some(t) => templates::find_template(t)
                .ok_or_else(|| StudioError::NotFound(format!("template {t}")))?
                .code,
            None => BLANK_PROJECT_CODE,
        };

        let project = self
            .backend
            .create_project(
                &session.user_id,
                &NewProject {
                    name: name.to_string(),
                    description: description.filter(|d| !d.is_empty()).map(str::to_string),
                    code: code.to_string(),
                },
            )
            .await?;
        self.notifier
            .success("Project created", &format!("{name} is ready to edit"));
        Ok(project)
    }

    pub async fn rename_project(
        &self,
        session: &Session,
        project_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Project> {
        templates::validate_project_name(name)?;
        templates::validate_description(description)?;
        self.owned_project(session, project_id).await?;
        self.backend.rename_project(project_id, name, description).await
    }

    pub async fn share_project(
        &self,
        session: &Session,
        project_id: &str,
        public: bool,
    ) -> Result<Project> {
        self.owned_project(session, project_id).await?;
        let project = self.backend.set_visibility(project_id, public).await?;
        let title = if public { "Project shared" } else { "Project is private" };
        self.notifier.push(crate::notify::ToastKind::Info, title, None::<String>);
        Ok(project)
    }

    pub async fn delete_project(&self, session: &Session, project_id: &str) -> Result<()> {
        self.owned_project(session, project_id).await?;
        self.backend.delete_project(project_id).await
    }

    /// An editor session over `project`; read-only unless the session owns it.
    pub fn open_editor(&self, session: Option<&Session>, project: &Project) -> EditorSession {
        let owner = session.is_some_and(|s| s.user_id == project.user_id);
        EditorSession::new(
            SessionOptions::new(project.code.clone())
                .project(project.id.clone())
                .read_only(!owner)
                .autosave_delay(self.autosave_delay),
            Arc::new(self.backend.clone()),
            self.notifier.clone(),
        )
    }

    // ── Compile ──────────────────────────────────────────

    /// Save `code`, compile it, and record the attempt whatever the result.
    pub async fn compile_project(
        &self,
        session: &Session,
        project_id: &str,
        code: &str,
    ) -> Result<CompileOutcome> {
        self.owned_project(session, project_id).await?;
        self.backend.update_code(project_id, code).await?;

        let result = self.compiler.compile(code, &session.user_id, project_id).await;
        let record = match &result {
            Ok(outcome) => NewCompilation {
                project_id: project_id.to_string(),
                user_id: session.user_id.clone(),
                code_snapshot: outcome.code_snapshot.clone(),
                status: if outcome.success {
                    RecordStatus::Success
                } else {
                    RecordStatus::Error
                },
                exit_code: Some(i64::from(outcome.exit_code)),
                stdout: outcome.stdout.clone(),
                stderr: outcome.stderr.clone(),
                abi: outcome.abi.clone(),
                metadata: serde_json::to_value(&outcome.details)?,
            },
            Err(e) => NewCompilation {
                project_id: project_id.to_string(),
                user_id: session.user_id.clone(),
                code_snapshot: code.to_string(),
                status: RecordStatus::Error,
                exit_code: None,
                stdout: String::new(),
                stderr: e.to_string(),
                abi: None,
                metadata: json!({}),
            },
        };
        self.backend.record_compilation(&record).await?;
        self.backend.touch_activity(project_id).await?;

        match &result {
            Ok(outcome) if outcome.success => {
                info!("Compiled {project_id} in {:.2}s", outcome.details.compilation_time);
                self.notifier
                    .success("Compilation successful", "Your contract compiled without errors");
            }
            Ok(outcome) => {
                warn!("Compilation of {project_id} exited with {}", outcome.exit_code);
                self.notifier
                    .error("Compilation failed", "Check the console output for errors");
            }
            Err(e) => {
                warn!("Compile request for {project_id} failed: {e}");
                self.notifier.error("Compilation failed", e.to_string());
            }
        }
        result
    }

    // ── Deploy ───────────────────────────────────────────

    /// Deploy the last successful build, refusing when the project's code
    /// has moved on since.
    pub async fn deploy_project(&self, session: &Session, project_id: &str) -> Result<Deployment> {
        let result = self.try_deploy(session, project_id).await;
        match &result {
            Ok(d) => self.notifier.success(
                "Deployment successful",
                &format!("Contract deployed at {}", d.contract_address),
            ),
            Err(e) => self.notifier.error("Deployment failed", e.to_string()),
        };
        result
    }

    async fn try_deploy(&self, session: &Session, project_id: &str) -> Result<Deployment> {
        let project = self.owned_project(session, project_id).await?;
        let compiled = self
            .backend
            .latest_successful_compilation(project_id)
            .await?
            .ok_or(StudioError::NotCompiled)?;
        if compiled.code_snapshot != project.code {
            return Err(StudioError::StaleCompilation);
        }

        let outcome = self.ledger.deploy(&session.user_id, project_id).await?;
        let chain = self.ledger.chain();
        let tx_hash = outcome.transaction.deployment_tx_hash.clone();

        let deployment = self
            .backend
            .record_deployment(&NewDeployment {
                project_id: project_id.to_string(),
                contract_address: outcome.transaction.contract_address.clone(),
                chain_id: i64::try_from(chain.chain_id)
                    .map_err(|_| StudioError::Config("CHAIN_ID out of range".into()))?,
                chain_name: chain.name.clone(),
                deployed_code: compiled.code_snapshot.clone(),
                abi: compiled.abi.map(|j| j.0).unwrap_or_default(),
                metadata: json!({
                    "tx_hash": tx_hash,
                    "deployment_time": outcome.deployment_time,
                    "compilation_id": compiled.id,
                    "explorer_url": format!("{}/tx/{tx_hash}", chain.explorer_url),
                }),
            })
            .await?;
        self.backend.touch_activity(project_id).await?;
        info!("Deployed {project_id} to {}", deployment.contract_address);
        Ok(deployment)
    }

    // ── Interface ────────────────────────────────────────

    pub async fn contract_status(&self, address: &str) -> ContractStatus {
        if self.ledger.code_exists_at(address).await {
            ContractStatus::Verified
        } else {
            ContractStatus::Unverified
        }
    }

    /// Invoke `method` with raw text arguments in parameter order. Every
    /// argument is parsed before any network call; each attempt is recorded.
    pub async fn invoke_method(
        &self,
        session: &Session,
        project_id: &str,
        contract_address: &str,
        method: &AbiEntry,
        raw_args: &[String],
    ) -> Result<InvokeOutcome> {
        self.owned_project(session, project_id).await?;

        let inputs: BTreeMap<String, String> = method
            .inputs
            .iter()
            .enumerate()
            .zip(raw_args)
            .map(|((i, p), raw)| {
                let key = if p.name.is_empty() { format!("arg{i}") } else { p.name.clone() };
                (key, raw.clone())
            })
            .collect();

        let result = match parse_args(method, raw_args) {
            Ok(args) => self.ledger.invoke(contract_address, method, &args).await,
            Err(e) => Err(e),
        };

        let (status, outputs, error) = match &result {
            Ok(outcome) => (RecordStatus::Success, outcome.to_json(), None),
            Err(e) => (RecordStatus::Error, Value::Null, Some(e.to_string())),
        };
        self.backend
            .record_abi_call(&NewAbiCall {
                project_id: project_id.to_string(),
                contract_address: contract_address.to_string(),
                method_name: method.name.clone(),
                method_type: method.state_mutability.as_str().to_string(),
                inputs,
                outputs,
                status,
                error,
            })
            .await?;

        match &result {
            Ok(InvokeOutcome::Transaction { tx_hash, .. }) => {
                self.notifier.success(
                    "Transaction confirmed",
                    &format!("{} included in {tx_hash}", method.name),
                );
            }
            Ok(InvokeOutcome::Call { .. }) => {}
            Err(e) => {
                self.notifier.error(&format!("{} failed", method.name), e.to_string());
            }
        }
        result
    }
}

fn parse_args(method: &AbiEntry, raw_args: &[String]) -> Result<Vec<AbiValue>> {
    let types = method.input_types()?;
    if types.len() != raw_args.len() {
        return Err(StudioError::Validation(format!(
            "{} expects {} argument(s), got {}",
            method.name,
            types.len(),
            raw_args.len()
        )));
    }
    types
        .iter()
        .zip(raw_args)
        .map(|(ty, raw)| abi::parse_value(raw, ty))
        .collect()
}
