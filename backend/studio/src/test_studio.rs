//! Workflow tests for [`Studio`] against mock compile and RPC servers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, routing::post, Json, Router};
use reqwest::Client;
use serde_json::{json, Value};

use crate::abi::{AbiEntry, AbiParam, EntryKind, StateMutability};
use crate::auth::Session;
use crate::backend::Backend;
use crate::compiler::RemoteApi;
use crate::config::ChainConfig;
use crate::errors::StudioError;
use crate::ledger::LedgerClient;
use crate::models::RecordStatus;
use crate::notify::Notifier;
use crate::rpc::RpcClient;
use crate::studio::{ContractStatus, Studio};

const CONTRACT: &str = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

/// Compile service: builds fail when the source contains `broken`.
async fn mock_service() -> String {
    let app = Router::new()
        .route(
            "/compile",
            post(|Json(req): Json<Value>| async move {
                let ok = !req["code"].as_str().unwrap_or_default().contains("broken");
                Json(json!({
                    "success": true,
                    "data": {
                        "success": ok,
                        "exit_code": if ok { 0 } else { 101 },
                        "stdout": "Compiling stylus-contract",
                        "stderr": if ok { "" } else { "error: expected item" },
                        "details": { "status": if ok { "ok" } else { "failed" }, "compilation_time": 2.0, "project_path": "/tmp/build" },
                        "abi": [{ "type": "function", "name": "number", "inputs": [], "outputs": [{ "name": "", "type": "uint256" }], "stateMutability": "view" }]
                    }
                }))
            }),
        )
        .route(
            "/deploy",
            post(|| async {
                Json(json!({
                    "success": true,
                    "data": {
                        "transaction": { "contract_address": CONTRACT, "deployment_tx_hash": "0xabc123" },
                        "deployment_time": 4.2
                    }
                }))
            }),
        );
    serve(app).await
}

/// JSON-RPC node that counts requests and answers every one with a
/// zero word.
async fn counting_node(hits: Arc<AtomicUsize>) -> String {
    let app = Router::new()
        .route(
            "/",
            post(|State(hits): State<Arc<AtomicUsize>>, Json(req): Json<Value>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let word = format!("0x{}", "0".repeat(64));
                Json(json!({ "jsonrpc": "2.0", "id": req["id"], "result": word }))
            }),
        )
        .with_state(hits);
    serve(app).await
}

fn studio(service_url: &str, rpc_url: &str, backend: Backend) -> Studio {
    let client = Client::new();
    let remote = RemoteApi::new(client.clone(), service_url, "test-key");
    let ledger = LedgerClient::new(
        RpcClient::new(client, rpc_url),
        ChainConfig {
            rpc_url: rpc_url.to_string(),
            chain_id: 421614,
            name: "Arbitrum Sepolia".into(),
            explorer_url: "https://sepolia.arbiscan.io".into(),
        },
        remote.clone(),
        None,
        Duration::from_secs(5),
    );
    Studio::new(backend, remote, ledger, Notifier::new())
}

async fn setup(rpc_url: &str) -> (Studio, Session) {
    let backend = Backend::connect("sqlite::memory:").await.unwrap();
    let studio = studio(&mock_service().await, rpc_url, backend);
    let (session, _) = studio.sign_in("dev@example.com", "hunter22").await.unwrap();
    (studio, session)
}

fn setter() -> AbiEntry {
    AbiEntry {
        kind: EntryKind::Function,
        name: "setOwner".into(),
        inputs: vec![AbiParam::new("owner", "address")],
        outputs: vec![],
        state_mutability: StateMutability::Nonpayable,
        anonymous: None,
    }
}

// ─────────────────────────────────────────────────────────
// Projects
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_project_validates_before_writing() {
    let (studio, session) = setup("http://127.0.0.1:1").await;
    let before = studio.backend().list_projects(&session.user_id).await.unwrap().len();

    let err = studio
        .create_project(&session, "My Token", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Validation(_)));
    let err = studio
        .create_project(&session, "token", Some(&"d".repeat(201)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Validation(_)));
    assert_eq!(
        studio.backend().list_projects(&session.user_id).await.unwrap().len(),
        before
    );

    let project = studio
        .create_project(&session, "my-token", Some("An ERC-20"), Some("ERC-20 Token"))
        .await
        .unwrap();
    assert!(project.code.contains("pub struct ERC20"));
    assert!(studio.notifier().titles().contains(&"Project created".to_string()));
}

#[tokio::test]
async fn only_owner_edits() {
    let (studio, owner) = setup("http://127.0.0.1:1").await;
    let project = studio
        .create_project(&owner, "mine", None, None)
        .await
        .unwrap();
    let (stranger, _) = studio.sign_in("other@example.com", "password1").await.unwrap();

    let err = studio.delete_project(&stranger, &project.id).await.unwrap_err();
    assert!(matches!(err, StudioError::NotFound(_)));

    let mut editor = studio.open_editor(Some(&stranger), &project);
    assert!(editor.save_now().is_none());
    let anonymous = studio.open_editor(None, &project);
    assert_eq!(anonymous.value(), project.code);
    drop(anonymous);
    drop(editor);
}

// ─────────────────────────────────────────────────────────
// Compile and deploy
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_build_is_recorded() {
    let (studio, session) = setup("http://127.0.0.1:1").await;
    let project = studio.create_project(&session, "broken-one", None, None).await.unwrap();

    let outcome = studio
        .compile_project(&session, &project.id, "broken code")
        .await
        .unwrap();
    assert!(!outcome.success);

    let history = studio.backend().list_compilations(&project.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RecordStatus::Error);
    assert_eq!(history[0].exit_code, Some(101));
    assert!(history[0].abi.is_none());
    assert!(studio.notifier().titles().contains(&"Compilation failed".to_string()));
}

#[tokio::test]
async fn unreachable_compiler_is_recorded() {
    let backend = Backend::connect("sqlite::memory:").await.unwrap();
    let studio = studio("http://127.0.0.1:1", "http://127.0.0.1:1", backend);
    let (session, _) = studio.sign_in("dev@example.com", "hunter22").await.unwrap();
    let project = studio.create_project(&session, "offline", None, None).await.unwrap();

    let err = studio
        .compile_project(&session, &project.id, "fn main() {}")
        .await
        .unwrap_err();
    assert!(matches!(err, StudioError::Compile(_)));

    let latest = studio.backend().latest_compilation(&project.id).await.unwrap().unwrap();
    assert_eq!(latest.status, RecordStatus::Error);
    assert_eq!(latest.exit_code, None);
    assert!(!latest.stderr.is_empty());
}

#[tokio::test]
async fn deploy_requires_a_build() {
    let (studio, session) = setup("http://127.0.0.1:1").await;
    let project = studio.create_project(&session, "fresh", None, None).await.unwrap();

    let err = studio.deploy_project(&session, &project.id).await.unwrap_err();
    assert!(matches!(err, StudioError::NotCompiled));
    assert!(studio.notifier().titles().contains(&"Deployment failed".to_string()));
}

#[tokio::test]
async fn edits_after_build_block_deploy() {
    let (studio, session) = setup("http://127.0.0.1:1").await;
    let project = studio.create_project(&session, "counter", None, None).await.unwrap();

    studio
        .compile_project(&session, &project.id, "// S1")
        .await
        .unwrap();
    studio.backend().update_code(&project.id, "// S2").await.unwrap();

    let err = studio.deploy_project(&session, &project.id).await.unwrap_err();
    assert!(matches!(err, StudioError::StaleCompilation));
    assert!(studio
        .backend()
        .list_deployments(&project.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deploy_records_snapshot_and_bumps_counter() {
    let (studio, session) = setup("http://127.0.0.1:1").await;
    let project = studio.create_project(&session, "counter", None, None).await.unwrap();
    let mut updates = studio.backend().subscribe_project(&project.id);

    studio
        .compile_project(&session, &project.id, "// S1")
        .await
        .unwrap();
    let deployment = studio.deploy_project(&session, &project.id).await.unwrap();

    assert_eq!(deployment.contract_address, CONTRACT);
    assert_eq!(deployment.deployed_code, "// S1");
    assert_eq!(deployment.chain_id, 421614);
    assert_eq!(deployment.abi.0[0].name, "number");
    assert_eq!(deployment.metadata.0["tx_hash"], "0xabc123");
    assert_eq!(
        deployment.metadata.0["explorer_url"],
        "https://sepolia.arbiscan.io/tx/0xabc123"
    );

    let refreshed = studio.backend().get_project(&project.id).await.unwrap();
    assert_eq!(refreshed.deployment_count, 1);

    let mut saw_count = false;
    while let Some(p) = updates.try_next() {
        saw_count |= p.deployment_count == 1;
    }
    assert!(saw_count);
}

// ─────────────────────────────────────────────────────────
// Interface
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn bad_argument_never_reaches_the_node() {
    let hits = Arc::new(AtomicUsize::new(0));
    let node = counting_node(Arc::clone(&hits)).await;
    let (studio, session) = setup(&node).await;
    let project = studio.create_project(&session, "owned", None, None).await.unwrap();

    let err = studio
        .invoke_method(&session, &project.id, CONTRACT, &setter(), &["not-an-address".into()])
        .await
        .unwrap_err();
    assert!(matches!(&err, StudioError::AbiParse { ty, .. } if ty == "address"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    let calls = studio.backend().list_abi_calls(&project.id, None).await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, RecordStatus::Error);
    assert_eq!(calls[0].method_name, "setOwner");
    assert_eq!(calls[0].inputs.0["owner"], "not-an-address");
    assert!(calls[0].error.is_some());
}

#[tokio::test]
async fn read_call_is_recorded_with_outputs() {
    let hits = Arc::new(AtomicUsize::new(0));
    let node = counting_node(Arc::clone(&hits)).await;
    let (studio, session) = setup(&node).await;
    let project = studio.create_project(&session, "reader", None, None).await.unwrap();
    let getter = AbiEntry {
        kind: EntryKind::Function,
        name: "number".into(),
        inputs: vec![],
        outputs: vec![AbiParam::new("", "uint256")],
        state_mutability: StateMutability::View,
        anonymous: None,
    };

    studio
        .invoke_method(&session, &project.id, CONTRACT, &getter, &[])
        .await
        .unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let calls = studio.backend().list_abi_calls(&project.id, Some(CONTRACT)).await.unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].status, RecordStatus::Success);
    assert_eq!(calls[0].method_type, "view");
}

#[tokio::test]
async fn unreachable_node_means_unverified() {
    let (studio, _) = setup("http://127.0.0.1:1").await;
    assert_eq!(studio.contract_status(CONTRACT).await, ContractStatus::Unverified);
    assert_eq!(studio.contract_status("0x12").await, ContractStatus::Unverified);
}
