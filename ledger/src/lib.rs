//! Vaultline Ledger
//!
//! Per-asset wallets grouped into accounts, the fee schedule and the
//! conversion engine that moves value between wallets. Every mutation either
//! commits completely or leaves balances untouched; balances never go
//! negative.

pub mod account;
pub mod config;
pub mod engine;
pub mod error;
pub mod fees;
pub mod journal;
pub mod store;
pub mod valuation;
pub mod wallet;

pub use account::{Account, SharedAccount};
pub use config::{LedgerConfig, RateMode};
pub use engine::{ConversionEngine, ConversionRequest, ConversionResult, TransferReceipt};
pub use error::{ConfigError, ConversionError, FeeError, StoreError, ValuationError, WalletError};
pub use fees::{
    FeePool, FeeSchedule, SharedFeePool, SharedFeeSchedule, WithdrawalFeeMode, WithdrawalTerms,
};
pub use journal::{EntryKind, JournalEntry};
pub use store::{AccountSnapshot, AccountStore, InMemoryAccountStore};
pub use valuation::{PortfolioValuation, ValuationLine, Valuator};
pub use wallet::Wallet;
