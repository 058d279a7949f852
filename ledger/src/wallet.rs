//! Per-asset wallet balances.

use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use vaultline_common::Asset;

use crate::error::WalletError;

/// Balance of a single asset.
///
/// The balance never drops below zero: a mutation that would take it
/// negative fails and leaves the balance untouched. Deposits and withdrawals
/// on the same wallet are serialized by its mutex.
#[derive(Debug)]
pub struct Wallet {
    asset: Asset,
    balance: Mutex<Decimal>,
}

impl Wallet {
    /// Create an empty wallet.
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            balance: Mutex::new(Decimal::ZERO),
        }
    }

    /// Create a wallet holding an opening balance.
    pub fn with_balance(asset: Asset, balance: Decimal) -> Result<Self, WalletError> {
        if balance < Decimal::ZERO {
            return Err(WalletError::InvalidAmount {
                asset,
                amount: balance,
                reason: "opening balance cannot be negative",
            });
        }
        Ok(Self {
            asset,
            balance: Mutex::new(balance),
        })
    }

    /// Asset held.
    pub fn asset(&self) -> Asset {
        self.asset
    }

    /// Current balance.
    pub fn balance(&self) -> Decimal {
        *self.balance.lock()
    }

    /// Check if the wallet currently covers `amount`.
    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance() >= amount
    }

    /// Add `amount` (zero allowed) and return the new balance.
    pub fn deposit(&self, amount: Decimal) -> Result<Decimal, WalletError> {
        let mut balance = self.balance.lock();
        apply_deposit(self.asset, &mut balance, amount)
    }

    /// Remove `amount` if fully covered and return the new balance.
    pub fn withdraw(&self, amount: Decimal) -> Result<Decimal, WalletError> {
        let mut balance = self.balance.lock();
        apply_withdraw(self.asset, &mut balance, amount)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Decimal> {
        self.balance.lock()
    }

    /// Global lock order: asset ordinal, then address for same-asset wallets
    /// owned by different accounts.
    fn lock_order(&self) -> (usize, usize) {
        (self.asset.ordinal(), self as *const Wallet as usize)
    }
}

fn apply_deposit(asset: Asset, balance: &mut Decimal, amount: Decimal) -> Result<Decimal, WalletError> {
    if amount < Decimal::ZERO {
        return Err(WalletError::InvalidAmount {
            asset,
            amount,
            reason: "deposit cannot be negative",
        });
    }
    *balance = credited(asset, *balance, amount)?;
    Ok(*balance)
}

fn apply_withdraw(asset: Asset, balance: &mut Decimal, amount: Decimal) -> Result<Decimal, WalletError> {
    *balance = debited(asset, *balance, amount)?;
    Ok(*balance)
}

fn credited(asset: Asset, balance: Decimal, amount: Decimal) -> Result<Decimal, WalletError> {
    balance.checked_add(amount).ok_or(WalletError::Overflow {
        asset,
        balance,
        amount,
    })
}

fn debited(asset: Asset, balance: Decimal, amount: Decimal) -> Result<Decimal, WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount {
            asset,
            amount,
            reason: "withdrawal must be positive",
        });
    }
    if balance < amount {
        return Err(WalletError::InsufficientFunds {
            asset,
            required: amount,
            available: balance,
        });
    }
    Ok(balance - amount)
}

/// Withdraw `debit` from `from` and deposit `credit` into `to` as one
/// critical section.
///
/// Both wallet locks are taken in global order and both new balances are
/// computed before either is written, so no observer ever sees the debit
/// without the credit. On error neither wallet changes. Returns the new
/// `(from, to)` balances.
pub(crate) fn transfer_between(
    from: &Wallet,
    debit: Decimal,
    to: &Wallet,
    credit: Decimal,
) -> Result<(Decimal, Decimal), WalletError> {
    if std::ptr::eq(from, to) {
        return Err(WalletError::SameWallet(from.asset));
    }
    if credit < Decimal::ZERO {
        return Err(WalletError::InvalidAmount {
            asset: to.asset,
            amount: credit,
            reason: "deposit cannot be negative",
        });
    }

    let (mut from_balance, mut to_balance) = if from.lock_order() < to.lock_order() {
        let f = from.balance.lock();
        let t = to.balance.lock();
        (f, t)
    } else {
        let t = to.balance.lock();
        let f = from.balance.lock();
        (f, t)
    };

    let from_after = debited(from.asset, *from_balance, debit)?;
    let to_after = credited(to.asset, *to_balance, credit)?;
    *from_balance = from_after;
    *to_balance = to_after;
    Ok((from_after, to_after))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn test_deposit_and_withdraw() {
        let wallet = Wallet::new(Asset::Btc);

        assert_eq!(wallet.deposit(dec!(1.5)).unwrap(), dec!(1.5));
        assert_eq!(wallet.deposit(Decimal::ZERO).unwrap(), dec!(1.5));
        assert_eq!(wallet.withdraw(dec!(0.5)).unwrap(), dec!(1.0));
        assert_eq!(wallet.balance(), dec!(1.0));
        assert!(wallet.has_sufficient_funds(dec!(1)));
        assert!(!wallet.has_sufficient_funds(dec!(1.01)));
    }

    #[test]
    fn test_withdraw_insufficient_leaves_balance() {
        let wallet = Wallet::with_balance(Asset::Eth, dec!(3)).unwrap();

        let err = wallet.withdraw(dec!(3.0001)).unwrap_err();

        assert_eq!(
            err,
            WalletError::InsufficientFunds {
                asset: Asset::Eth,
                required: dec!(3.0001),
                available: dec!(3),
            }
        );
        assert_eq!(wallet.balance(), dec!(3));
    }

    #[test]
    fn test_rejects_bad_amounts() {
        let wallet = Wallet::with_balance(Asset::Usdt, dec!(10)).unwrap();

        assert!(matches!(
            wallet.deposit(dec!(-1)),
            Err(WalletError::InvalidAmount { .. })
        ));
        assert!(matches!(
            wallet.withdraw(Decimal::ZERO),
            Err(WalletError::InvalidAmount { .. })
        ));
        assert!(Wallet::with_balance(Asset::Usdt, dec!(-0.01)).is_err());
        assert_eq!(wallet.balance(), dec!(10));
    }

    #[test]
    fn test_withdraw_entire_balance() {
        let wallet = Wallet::with_balance(Asset::Btc, dec!(0.25)).unwrap();
        assert_eq!(wallet.withdraw(dec!(0.25)).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_transfer_between_is_all_or_nothing() {
        let btc = Wallet::with_balance(Asset::Btc, dec!(1)).unwrap();
        let eth = Wallet::with_balance(Asset::Eth, dec!(5)).unwrap();

        let (btc_after, eth_after) = transfer_between(&btc, dec!(0.5), &eth, dec!(9.95)).unwrap();
        assert_eq!(btc_after, dec!(0.5));
        assert_eq!(eth_after, dec!(14.95));

        let err = transfer_between(&btc, dec!(0.6), &eth, dec!(12)).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
        assert_eq!(btc.balance(), dec!(0.5));
        assert_eq!(eth.balance(), dec!(14.95));

        assert!(matches!(
            transfer_between(&btc, dec!(0.1), &btc, dec!(0.1)),
            Err(WalletError::SameWallet(Asset::Btc))
        ));
    }

    #[test]
    fn test_transfer_into_full_wallet_leaves_both_untouched() {
        let btc = Wallet::with_balance(Asset::Btc, dec!(1)).unwrap();
        let eth = Wallet::with_balance(Asset::Eth, Decimal::MAX).unwrap();

        let err = transfer_between(&btc, dec!(0.5), &eth, dec!(10)).unwrap_err();

        assert_eq!(err.error_code(), "BALANCE_OVERFLOW");
        assert_eq!(btc.balance(), dec!(1));
        assert_eq!(eth.balance(), Decimal::MAX);
    }

    #[test]
    fn test_deposit_overflow_is_rejected() {
        let wallet = Wallet::with_balance(Asset::Usdt, Decimal::MAX).unwrap();

        assert_eq!(
            wallet.deposit(dec!(1)).unwrap_err(),
            WalletError::Overflow {
                asset: Asset::Usdt,
                balance: Decimal::MAX,
                amount: dec!(1),
            }
        );
        assert_eq!(wallet.balance(), Decimal::MAX);
    }

    #[test]
    fn test_opposing_transfers_do_not_deadlock() {
        let btc = Arc::new(Wallet::with_balance(Asset::Btc, dec!(1000)).unwrap());
        let eth = Arc::new(Wallet::with_balance(Asset::Eth, dec!(1000)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let btc = btc.clone();
                let eth = eth.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        if i % 2 == 0 {
                            transfer_between(&btc, dec!(1), &eth, dec!(1)).unwrap();
                        } else {
                            transfer_between(&eth, dec!(1), &btc, dec!(1)).unwrap();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        // Equal numbers of transfers each way.
        assert_eq!(btc.balance(), dec!(1000));
        assert_eq!(eth.balance(), dec!(1000));
    }

    #[test]
    fn test_concurrent_withdrawals_never_overdraw() {
        let wallet = Arc::new(Wallet::with_balance(Asset::Usdt, dec!(100)).unwrap());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let wallet = wallet.clone();
                std::thread::spawn(move || wallet.withdraw(dec!(10)).is_ok())
            })
            .collect();

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 10);
        assert_eq!(wallet.balance(), Decimal::ZERO);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Deposit(i64),
        Withdraw(i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (-50i64..5_000).prop_map(Op::Deposit),
            (-50i64..5_000).prop_map(Op::Withdraw),
        ]
    }

    proptest! {
        #[test]
        fn prop_balance_never_negative(ops in proptest::collection::vec(op(), 1..64)) {
            let wallet = Wallet::new(Asset::Eth);
            for op in ops {
                let before = wallet.balance();
                let result = match op {
                    Op::Deposit(cents) => wallet.deposit(Decimal::new(cents, 2)),
                    Op::Withdraw(cents) => wallet.withdraw(Decimal::new(cents, 2)),
                };
                prop_assert!(wallet.balance() >= Decimal::ZERO);
                if result.is_err() {
                    prop_assert_eq!(wallet.balance(), before);
                }
            }
        }
    }
}
