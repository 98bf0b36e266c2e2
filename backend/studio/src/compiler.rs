//! Client for the remote compile and deploy service.
//!
//! Both endpoints wrap their payload in the same envelope:
//! `{ success, message, data, error: { code, message, details } }`.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::abi::InterfaceDescriptor;
use crate::errors::{Result, StudioError};

#[derive(Debug, Serialize)]
struct CompileRequest<'a> {
    user_id: &'a str,
    project_id: &'a str,
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct DeployRequest<'a> {
    user_id: &'a str,
    project_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
    data: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[allow(dead_code)]
    code: Option<String>,
    message: String,
    details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileDetails {
    pub status: String,
    pub compilation_time: f64,
    pub project_path: String,
}

#[derive(Debug, Deserialize)]
struct CompileResponse {
    success: bool,
    exit_code: i32,
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    details: CompileDetails,
    abi: Option<InterfaceDescriptor>,
}

/// Result of one compile request.
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub details: CompileDetails,
    /// Present only when `success` is true
    pub abi: Option<InterfaceDescriptor>,
    /// The exact source text that was submitted
    pub code_snapshot: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployedTransaction {
    pub contract_address: String,
    pub deployment_tx_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutcome {
    pub transaction: DeployedTransaction,
    pub deployment_time: f64,
}

#[derive(Debug, Clone)]
pub struct RemoteApi {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RemoteApi {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Submit full source text for compilation. A response that carries a
    /// failed build is still `Ok`; only transport and envelope failures are
    /// errors.
    pub async fn compile(
        &self,
        code: &str,
        user_id: &str,
        project_id: &str,
    ) -> Result<CompileOutcome> {
        info!("Compiling project {project_id} ({} bytes)", code.len());
        let body = CompileRequest {
            user_id,
            project_id,
            code,
        };
        let data: CompileResponse = self
            .post("compile", &body)
            .await
            .map_err(|e| StudioError::Compile(message_of(e)))?;

        Ok(CompileOutcome {
            success: data.success,
            exit_code: data.exit_code,
            stdout: data.stdout,
            stderr: data.stderr,
            details: data.details,
            abi: if data.success {
                Some(data.abi.unwrap_or_default())
            } else {
                None
            },
            code_snapshot: code.to_string(),
        })
    }

    /// Ask the remote service to deploy the project's last build.
    pub async fn deploy(&self, user_id: &str, project_id: &str) -> Result<DeploymentOutcome> {
        info!("Deploying project {project_id}");
        let body = DeployRequest {
            user_id,
            project_id,
        };
        self.post("deploy", &body)
            .await
            .map_err(|e| StudioError::Deploy(message_of(e)))
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let resp = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        let envelope: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(env) => env,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(StudioError::Validation(format!(
                    "{path} request failed with status {status}"
                )))
            }
        };

        match (envelope.success, envelope.data) {
            (true, Some(data)) if status.is_success() => Ok(data),
            _ => {
                let err = envelope.error;
                let message = err
                    .as_ref()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| format!("{path} request failed"));
                if let Some(details) = err.and_then(|e| e.details) {
                    warn!("{path} failed: {message} ({details})");
                }
                Err(StudioError::Validation(message))
            }
        }
    }
}

/// Keep the remote service's own wording when it gave one.
fn message_of(err: StudioError) -> String {
    match err {
        StudioError::Validation(msg) => msg,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn compile_success_carries_descriptor() {
        let app = Router::new().route(
            "/compile",
            post(|Json(req): Json<Value>| async move {
                assert_eq!(req["project_id"], "p1");
                Json(json!({
                    "success": true, "message": "ok",
                    "data": {
                        "success": true, "exit_code": 0,
                        "stdout": "Finished", "stderr": "",
                        "details": { "status": "ok", "compilation_time": 1.5, "project_path": "/tmp/p1" },
                        "abi": [{ "type": "function", "name": "number", "inputs": [], "outputs": [{"name":"","type":"uint256"}], "stateMutability": "view" }]
                    },
                    "error": null
                }))
            }),
        );
        let api = RemoteApi::new(Client::new(), serve(app).await, "key");

        let outcome = api.compile("fn main() {}", "u1", "p1").await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.abi.unwrap()[0].name, "number");
        assert_eq!(outcome.code_snapshot, "fn main() {}");
    }

    #[tokio::test]
    async fn failed_build_has_no_descriptor() {
        let app = Router::new().route(
            "/compile",
            post(|| async {
                Json(json!({
                    "success": true,
                    "data": {
                        "success": false, "exit_code": 101,
                        "stdout": "", "stderr": "error[E0425]",
                        "details": { "status": "failed", "compilation_time": 0.4, "project_path": "/tmp/p" },
                        "abi": null
                    }
                }))
            }),
        );
        let api = RemoteApi::new(Client::new(), serve(app).await, "key");

        let outcome = api.compile("broken", "u1", "p1").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, 101);
        assert!(outcome.abi.is_none());
    }

    #[tokio::test]
    async fn envelope_error_message_is_surfaced() {
        let app = Router::new().route(
            "/deploy",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({
                        "success": false, "data": null,
                        "error": { "code": "NO_BUILD", "message": "Project has not been compiled", "details": null }
                    })),
                )
            }),
        );
        let api = RemoteApi::new(Client::new(), serve(app).await, "key");

        let err = api.deploy("u1", "p1").await.unwrap_err();
        assert!(matches!(err, StudioError::Deploy(msg) if msg == "Project has not been compiled"));
    }
}
