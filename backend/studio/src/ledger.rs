//! Ledger client: bytecode verification, method invocation and deployment.
//!
//! Read-only methods go through `eth_call`. State-changing methods are
//! submitted with `eth_sendTransaction` from the configured wallet account
//! (the node or wallet endpoint holds the key) and the client then polls for
//! the receipt until [`LedgerClient::receipt_timeout`] elapses.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::abi::{self, AbiEntry, AbiValue};
use crate::compiler::{DeploymentOutcome, RemoteApi};
use crate::config::ChainConfig;
use crate::errors::{Result, StudioError};
use crate::rpc::{self, RawReceipt, RpcClient};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    /// Result of a read-only call.
    Call { outputs: Vec<AbiValue> },
    /// Receipt of an included transaction.
    Transaction {
        tx_hash: String,
        gas_used: u64,
        logs: Vec<TxLog>,
    },
}

impl InvokeOutcome {
    /// JSON shape stored as the `outputs` of an interface call record.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Call { outputs } => {
                serde_json::Value::Array(outputs.iter().map(AbiValue::to_json).collect())
            }
            Self::Transaction {
                tx_hash,
                gas_used,
                logs,
            } => serde_json::json!({
                "tx_hash": tx_hash,
                "gas_used": gas_used.to_string(),
                "logs": logs,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerClient {
    rpc: RpcClient,
    chain: ChainConfig,
    deployer: RemoteApi,
    wallet_address: Option<String>,
    receipt_timeout: Duration,
}

impl LedgerClient {
    pub fn new(
        rpc: RpcClient,
        chain: ChainConfig,
        deployer: RemoteApi,
        wallet_address: Option<String>,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            rpc,
            chain,
            deployer,
            wallet_address,
            receipt_timeout,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }

    /// Whether bytecode is deployed at `address` on the configured network.
    /// Every failure, including a malformed address or a wrong network,
    /// degrades to `false`.
    pub async fn code_exists_at(&self, address: &str) -> bool {
        match self.try_code_exists_at(address).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Contract verification failed for {address}: {e}");
                false
            }
        }
    }

    async fn try_code_exists_at(&self, address: &str) -> Result<bool> {
        abi::parse_address(address)?;
        let chain_id = self.rpc.chain_id().await?;
        if chain_id != self.chain.chain_id {
            return Err(StudioError::Validation(format!(
                "Wrong network {chain_id}. Please connect to {}",
                self.chain.name
            )));
        }
        let code = self.rpc.get_code(address).await?;
        Ok(!code.is_empty() && code != "0x")
    }

    /// Invoke `method` on the contract at `address` with already-parsed
    /// arguments.
    pub async fn invoke(
        &self,
        address: &str,
        method: &AbiEntry,
        args: &[AbiValue],
    ) -> Result<InvokeOutcome> {
        let to = abi::to_checksum(&abi::parse_address(address)?);
        let data = format!("0x{}", hex::encode(abi::encode_call(method, args)?));

        if method.is_read_only() {
            debug!("eth_call {}.{}", to, method.name);
            let raw = self.rpc.call(&to, &data).await?;
            let outputs = abi::decode_output(method, &rpc::decode_hex_data(&raw)?)?;
            return Ok(InvokeOutcome::Call { outputs });
        }

        let from = self.wallet_address.as_deref().ok_or_else(|| {
            StudioError::Config("WALLET_ADDRESS is required for state-changing calls".into())
        })?;
        let tx_hash = self.rpc.send_transaction(from, &to, &data).await?;
        info!("Submitted {}.{} in {tx_hash}", to, method.name);

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if !receipt.succeeded() {
            return Err(StudioError::Reverted(tx_hash));
        }
        Ok(InvokeOutcome::Transaction {
            gas_used: rpc::parse_quantity(&receipt.gas_used)?,
            tx_hash: receipt.transaction_hash,
            logs: receipt
                .logs
                .into_iter()
                .map(|l| TxLog {
                    address: l.address,
                    topics: l.topics,
                    data: l.data,
                })
                .collect(),
        })
    }

    /// Poll for inclusion of `tx_hash`, giving up after the configured
    /// timeout.
    pub async fn wait_for_receipt(&self, tx_hash: &str) -> Result<RawReceipt> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            if let Some(receipt) = self.rpc.transaction_receipt(tx_hash).await? {
                debug!("{tx_hash} included in block {:?}", receipt.block_number);
                return Ok(receipt);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StudioError::ReceiptTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_secs: self.receipt_timeout.as_secs(),
                });
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    /// Deployment is performed by the remote service, not by a locally
    /// built transaction.
    pub async fn deploy(&self, user_id: &str, project_id: &str) -> Result<DeploymentOutcome> {
        self.deployer.deploy(user_id, project_id).await
    }
}
