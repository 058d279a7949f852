//! Journal entries recording every committed wallet mutation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vaultline_common::{AccountId, Asset};

/// Kind of journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Funds credited from outside the ledger.
    Deposit,
    /// Funds debited to outside the ledger.
    Withdrawal,
    /// Source side of a conversion.
    ConversionDebit,
    /// Target side of a conversion.
    ConversionCredit,
}

impl EntryKind {
    /// Whether this entry increased the wallet balance.
    pub fn is_credit(self) -> bool {
        matches!(self, EntryKind::Deposit | EntryKind::ConversionCredit)
    }
}

/// A single journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique, time-ordered entry ID.
    pub id: Uuid,
    pub account_id: AccountId,
    pub kind: EntryKind,
    pub asset: Asset,
    /// Amount moved on the wallet, always non-negative.
    pub amount: Decimal,
    /// Fee charged alongside this movement, if any.
    pub fee: Decimal,
    /// Wallet balance once the entry was applied.
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Create an entry stamped at `created_at`.
    pub fn new(
        account_id: AccountId,
        kind: EntryKind,
        asset: Asset,
        amount: Decimal,
        fee: Decimal,
        balance_after: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            account_id,
            kind,
            asset,
            amount,
            fee,
            balance_after,
            created_at,
        }
    }

    /// Signed effect on the wallet balance.
    pub fn signed_amount(&self) -> Decimal {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// Net movement per asset over a sequence of entries.
pub fn net_movements<'a>(entries: impl IntoIterator<Item = &'a JournalEntry>) -> [Decimal; 3] {
    let mut net = [Decimal::ZERO; 3];
    for entry in entries {
        net[entry.asset.ordinal()] += entry.signed_amount();
    }
    net
}
