//! Accounts: one wallet per asset plus a journal.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use vaultline_common::{AccountId, Asset, Timestamp};

use crate::error::WalletError;
use crate::journal::JournalEntry;
use crate::store::AccountSnapshot;
use crate::wallet::Wallet;

/// A ledger account.
///
/// Holds exactly one wallet per asset, indexed by asset ordinal.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    wallets: [Wallet; 3],
    journal: Mutex<Vec<JournalEntry>>,
}

impl Account {
    /// Create an account with empty wallets.
    pub fn new(id: AccountId) -> Self {
        Self {
            id,
            wallets: Asset::ALL.map(Wallet::new),
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Rebuild an account from a stored snapshot.
    ///
    /// Assets missing from the snapshot start empty. The journal is not
    /// part of a snapshot and starts empty.
    pub fn restore(snapshot: &AccountSnapshot) -> Result<Self, WalletError> {
        let wallet = |asset: Asset| {
            let balance = snapshot
                .balances
                .get(&asset)
                .copied()
                .unwrap_or(Decimal::ZERO);
            Wallet::with_balance(asset, balance)
        };
        let wallets = [wallet(Asset::Btc)?, wallet(Asset::Eth)?, wallet(Asset::Usdt)?];

        Ok(Self {
            id: snapshot.account_id.clone(),
            wallets,
            journal: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// Wallet holding `asset`.
    pub fn wallet(&self, asset: Asset) -> &Wallet {
        &self.wallets[asset.ordinal()]
    }

    /// Current balance of `asset`.
    pub fn balance(&self, asset: Asset) -> Decimal {
        self.wallet(asset).balance()
    }

    /// Current balances of every asset, each read independently.
    pub fn balances(&self) -> BTreeMap<Asset, Decimal> {
        self.wallets.iter().map(|w| (w.asset(), w.balance())).collect()
    }

    /// Copy of the journal, oldest first.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().clone()
    }

    /// Number of journal entries.
    pub fn journal_len(&self) -> usize {
        self.journal.lock().len()
    }

    pub(crate) fn record(&self, entries: impl IntoIterator<Item = JournalEntry>) {
        self.journal.lock().extend(entries);
    }

    /// Consistent view of every balance.
    ///
    /// All wallet locks are held together, taken in ordinal order, so a
    /// conversion is never observed half applied.
    pub fn snapshot(&self, now: Timestamp) -> AccountSnapshot {
        let guards: Vec<_> = self.wallets.iter().map(|w| (w.asset(), w.lock())).collect();
        let balances = guards.iter().map(|(asset, g)| (*asset, **g)).collect();
        drop(guards);

        AccountSnapshot {
            account_id: self.id.clone(),
            balances,
            taken_at: now,
        }
    }
}

/// Shared account handle.
pub type SharedAccount = Arc<Account>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_account_is_empty() {
        let account = Account::new(AccountId::new("alice"));

        for asset in Asset::ALL {
            assert_eq!(account.wallet(asset).asset(), asset);
            assert_eq!(account.balance(asset), Decimal::ZERO);
        }
        assert_eq!(account.journal_len(), 0);
    }

    #[test]
    fn test_snapshot_and_restore() {
        let account = Account::new(AccountId::new("bob"));
        account.wallet(Asset::Btc).deposit(dec!(1.25)).unwrap();
        account.wallet(Asset::Usdt).deposit(dec!(300)).unwrap();

        let now = Utc::now();
        let snapshot = account.snapshot(now);
        assert_eq!(snapshot.taken_at, now);
        assert_eq!(snapshot.balances.get(&Asset::Btc), Some(&dec!(1.25)));
        assert_eq!(snapshot.balances.get(&Asset::Eth), Some(&Decimal::ZERO));

        let restored = Account::restore(&snapshot).unwrap();
        assert_eq!(restored.id(), account.id());
        assert_eq!(restored.balances(), account.balances());
    }

    #[test]
    fn test_restore_fills_missing_assets_and_rejects_negative() {
        let mut balances = BTreeMap::new();
        balances.insert(Asset::Eth, dec!(2));
        let snapshot = AccountSnapshot {
            account_id: AccountId::new("carol"),
            balances,
            taken_at: Utc::now(),
        };

        let account = Account::restore(&snapshot).unwrap();
        assert_eq!(account.balance(Asset::Eth), dec!(2));
        assert_eq!(account.balance(Asset::Btc), Decimal::ZERO);

        let mut bad = snapshot.clone();
        bad.balances.insert(Asset::Usdt, dec!(-1));
        assert!(matches!(
            Account::restore(&bad),
            Err(WalletError::InvalidAmount { asset: Asset::Usdt, .. })
        ));
    }
}
