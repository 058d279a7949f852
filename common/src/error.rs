//! Error types shared across Vaultline crates.

use thiserror::Error;

/// Errors produced while parsing shared types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Asset ticker or provider id not in the supported set.
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// Account identifier failed validation.
    #[error("Invalid account id: {0:?}")]
    InvalidAccountId(String),
}

impl CommonError {
    /// Get error code for logs and receipts.
    pub fn error_code(&self) -> &'static str {
        match self {
            CommonError::UnknownAsset(_) => "UNKNOWN_ASSET",
            CommonError::InvalidAccountId(_) => "INVALID_ACCOUNT_ID",
        }
    }
}
