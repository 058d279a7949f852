//! Conversion engine: fee-bearing deposits, withdrawals and cross-asset
//! conversions against an account's wallets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use vaultline_common::{Asset, SharedClock};
use vaultline_fx::{CancellationToken, RateSource};

use crate::account::Account;
use crate::error::{ConversionError, WalletError};
use crate::fees::{SharedFeePool, SharedFeeSchedule};
use crate::journal::{EntryKind, JournalEntry};
use crate::wallet::transfer_between;

/// Request to convert `amount` of `from` into `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub from: Asset,
    pub to: Asset,
    pub amount: Decimal,
}

impl ConversionRequest {
    pub fn new(from: Asset, to: Asset, amount: Decimal) -> Self {
        Self { from, to, amount }
    }

    /// Check the request is well formed.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.from == self.to {
            return Err(ConversionError::InvalidRequest(format!(
                "cannot convert {} into itself",
                self.from
            )));
        }
        if self.amount <= Decimal::ZERO {
            return Err(ConversionError::InvalidRequest(format!(
                "amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Outcome of a committed conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub from: Asset,
    pub to: Asset,
    /// Taken from the source wallet.
    pub debited: Decimal,
    /// `debited * effective_rate`, before the exchange fee.
    pub gross_received: Decimal,
    /// Added to the target wallet.
    pub credited: Decimal,
    /// Units of `to` per unit of `from`.
    pub effective_rate: Decimal,
    /// Exchange fee, in units of `to`.
    pub fee_charged: Decimal,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

/// Outcome of a fee-bearing deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub asset: Asset,
    pub kind: EntryKind,
    /// Amount the caller asked to move.
    pub requested: Decimal,
    /// Banking fee charged.
    pub fee: Decimal,
    /// Amount credited to or debited from the wallet.
    pub wallet_amount: Decimal,
    /// Amount that crossed the ledger boundary: received for a deposit,
    /// paid out for a withdrawal.
    pub settled_amount: Decimal,
    pub balance_after: Decimal,
}

/// Applies fees and rates to account wallets.
///
/// Every operation either commits completely (wallets, fee pool and journal)
/// or leaves all of them untouched.
pub struct ConversionEngine {
    fees: SharedFeeSchedule,
    rates: RateSource,
    fee_pool: SharedFeePool,
    clock: SharedClock,
}

impl ConversionEngine {
    pub fn new(
        fees: SharedFeeSchedule,
        rates: RateSource,
        fee_pool: SharedFeePool,
        clock: SharedClock,
    ) -> Self {
        Self {
            fees,
            rates,
            fee_pool,
            clock,
        }
    }

    pub fn fees(&self) -> &SharedFeeSchedule {
        &self.fees
    }

    pub fn rates(&self) -> &RateSource {
        &self.rates
    }

    pub fn fee_pool(&self) -> &SharedFeePool {
        &self.fee_pool
    }

    /// Convert between two of the account's wallets.
    pub async fn convert(
        &self,
        account: &Account,
        request: ConversionRequest,
    ) -> Result<ConversionResult, ConversionError> {
        self.convert_with_cancel(account, request, &CancellationToken::new())
            .await
    }

    /// Convert, abandoning rate resolution if `cancel` fires.
    ///
    /// Funds are checked before the rate is resolved and again at commit,
    /// since the source wallet may be drained while the rate is fetched.
    #[instrument(skip(self, account, cancel), fields(account = %account.id()))]
    pub async fn convert_with_cancel(
        &self,
        account: &Account,
        request: ConversionRequest,
        cancel: &CancellationToken,
    ) -> Result<ConversionResult, ConversionError> {
        request.validate()?;
        let ConversionRequest { from, to, amount } = request;

        let source = account.wallet(from);
        let target = account.wallet(to);

        let available = source.balance();
        if available < amount {
            return Err(ConversionError::InsufficientFunds {
                asset: from,
                required: amount,
                available,
            });
        }

        let rate = self
            .rates
            .resolve(from, to, cancel)
            .await
            .map_err(|reason| {
                if reason.is_cancelled() {
                    ConversionError::Cancelled { from, to }
                } else {
                    warn!(from = %from, to = %to, error = %reason, "Rate unavailable");
                    ConversionError::RateUnavailable { from, to, reason }
                }
            })?;

        let gross = amount.checked_mul(rate).ok_or_else(|| {
            ConversionError::InvalidRequest(format!(
                "{amount} {from} at rate {rate} exceeds the representable {to} amount"
            ))
        })?;
        let fee = self.fees.exchange_fee(gross);
        let net = gross - fee;

        let (from_balance, to_balance) =
            transfer_between(source, amount, target, net).map_err(|e| {
                warn!(from = %from, error = %e, "Conversion commit failed");
                ConversionError::from(e)
            })?;

        self.fee_pool.collect(to, fee);

        let now = self.clock.now();
        account.record([
            JournalEntry::new(
                account.id().clone(),
                EntryKind::ConversionDebit,
                from,
                amount,
                Decimal::ZERO,
                from_balance,
                now,
            ),
            JournalEntry::new(
                account.id().clone(),
                EntryKind::ConversionCredit,
                to,
                net,
                fee,
                to_balance,
                now,
            ),
        ]);

        info!(
            from = %from,
            to = %to,
            debited = %amount,
            credited = %net,
            rate = %rate,
            fee = %fee,
            source = self.rates.kind(),
            "Conversion committed"
        );

        Ok(ConversionResult {
            from,
            to,
            debited: amount,
            gross_received: gross,
            credited: net,
            effective_rate: rate,
            fee_charged: fee,
            from_balance,
            to_balance,
        })
    }

    /// Deposit `amount` of `asset`, crediting it net of the banking fee.
    #[instrument(skip(self, account), fields(account = %account.id()))]
    pub fn deposit(
        &self,
        account: &Account,
        asset: Asset,
        amount: Decimal,
    ) -> Result<TransferReceipt, WalletError> {
        if amount < Decimal::ZERO {
            return Err(WalletError::InvalidAmount {
                asset,
                amount,
                reason: "deposit cannot be negative",
            });
        }

        let fee = self.fees.banking_fee(amount);
        let credit = amount - fee;
        let balance_after = account.wallet(asset).deposit(credit)?;
        self.fee_pool.collect(asset, fee);

        account.record([JournalEntry::new(
            account.id().clone(),
            EntryKind::Deposit,
            asset,
            credit,
            fee,
            balance_after,
            self.clock.now(),
        )]);

        info!(asset = %asset, amount = %amount, credited = %credit, fee = %fee, "Deposit committed");

        Ok(TransferReceipt {
            asset,
            kind: EntryKind::Deposit,
            requested: amount,
            fee,
            wallet_amount: credit,
            settled_amount: amount,
            balance_after,
        })
    }

    /// Withdraw `amount` of `asset`, charging the banking fee according to
    /// the schedule's withdrawal mode.
    #[instrument(skip(self, account), fields(account = %account.id()))]
    pub fn withdraw(
        &self,
        account: &Account,
        asset: Asset,
        amount: Decimal,
    ) -> Result<TransferReceipt, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount {
                asset,
                amount,
                reason: "withdrawal must be positive",
            });
        }

        let terms = self
            .fees
            .withdrawal_terms(amount)
            .ok_or(WalletError::InvalidAmount {
                asset,
                amount,
                reason: "withdrawal plus fee exceeds the representable amount",
            })?;
        let balance_after = account.wallet(asset).withdraw(terms.debit).map_err(|e| {
            warn!(asset = %asset, error = %e, "Withdrawal rejected");
            e
        })?;
        self.fee_pool.collect(asset, terms.fee);

        account.record([JournalEntry::new(
            account.id().clone(),
            EntryKind::Withdrawal,
            asset,
            terms.debit,
            terms.fee,
            balance_after,
            self.clock.now(),
        )]);

        info!(
            asset = %asset,
            debited = %terms.debit,
            paid_out = %terms.payout,
            fee = %terms.fee,
            mode = %self.fees.withdrawal_mode(),
            "Withdrawal committed"
        );

        Ok(TransferReceipt {
            asset,
            kind: EntryKind::Withdrawal,
            requested: amount,
            fee: terms.fee,
            wallet_amount: terms.debit,
            settled_amount: terms.payout,
            balance_after,
        })
    }
}
