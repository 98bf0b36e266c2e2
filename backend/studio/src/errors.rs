//! Application-wide error types.

use thiserror::Error;

use crate::editor::widget::WidgetError;

/// Message shown for every credential failure, whatever the cause.
pub const INVALID_CREDENTIALS: &str = "Email or password is incorrect";

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Error parsing {ty} value: {reason}")]
    AbiParse { ty: String, reason: String },

    #[error("ABI decode error: {0}")]
    AbiDecode(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Compilation failed: {0}")]
    Compile(String),

    #[error("Deployment failed: {0}")]
    Deploy(String),

    #[error("Code has changed since last compilation. Please compile again before deploying.")]
    StaleCompilation,

    #[error("No successful compilation found. Please compile before deploying.")]
    NotCompiled,

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("{INVALID_CREDENTIALS}")]
    InvalidCredentials,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction {tx_hash} not included after {waited_secs}s")]
    ReceiptTimeout { tx_hash: String, waited_secs: u64 },

    #[error("Transaction {0} reverted")]
    Reverted(String),

    #[error("Editor error: {0}")]
    Widget(#[from] WidgetError),
}

impl StudioError {
    /// Build an [`StudioError::AbiParse`] naming the offending type.
    pub fn abi_parse(ty: impl ToString, reason: impl Into<String>) -> Self {
        Self::AbiParse {
            ty: ty.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
