//! Account persistence boundary.

use std::collections::BTreeMap;

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vaultline_common::{AccountId, Asset, Timestamp};

use crate::error::StoreError;

/// Point-in-time balances of an account, as handed to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: AccountId,
    pub balances: BTreeMap<Asset, Decimal>,
    pub taken_at: Timestamp,
}

impl AccountSnapshot {
    /// Balance of `asset`, zero when absent.
    pub fn balance(&self, asset: Asset) -> Decimal {
        self.balances.get(&asset).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Where account snapshots are persisted.
///
/// The ledger never calls a store on its own; session layers save after
/// each mutation they drive.
pub trait AccountStore: Send + Sync {
    /// Persist a snapshot, replacing any earlier one for the same account.
    fn save(&self, snapshot: &AccountSnapshot) -> Result<(), StoreError>;

    /// Latest snapshot for `account_id`, `None` if never saved.
    fn load(&self, account_id: &AccountId) -> Result<Option<AccountSnapshot>, StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    snapshots: DashMap<AccountId, AccountSnapshot>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored accounts.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn save(&self, snapshot: &AccountSnapshot) -> Result<(), StoreError> {
        if let Some(existing) = self.snapshots.get(&snapshot.account_id) {
            if existing.taken_at > snapshot.taken_at {
                return Err(StoreError::SaveFailed {
                    account_id: snapshot.account_id.clone(),
                    reason: format!(
                        "snapshot taken at {} is older than stored {}",
                        snapshot.taken_at, existing.taken_at
                    ),
                });
            }
        }

        self.snapshots
            .insert(snapshot.account_id.clone(), snapshot.clone());
        debug!(account = %snapshot.account_id, "Saved account snapshot");
        Ok(())
    }

    fn load(&self, account_id: &AccountId) -> Result<Option<AccountSnapshot>, StoreError> {
        Ok(self.snapshots.get(account_id).map(|s| s.clone()))
    }
}
