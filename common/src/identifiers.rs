//! Identifier types for Vaultline entities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CommonError;

/// Identifier of a ledger account, normally the owner's username.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Create a new account ID without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a validated account ID.
    pub fn parse(id: impl Into<String>) -> Result<Self, CommonError> {
        let id = Self(id.into());
        if id.is_valid() {
            Ok(id)
        } else {
            Err(CommonError::InvalidAccountId(id.0))
        }
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty, at most 64 characters, alphanumerics plus `_`, `-` and `.`.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= 64
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
