//! Vaultline Common Types
//!
//! Shared types used across the Vaultline workspace: the tradable asset set,
//! account identifiers, and the injectable clock every time-sensitive
//! component reads from.

pub mod asset;
pub mod identifiers;
pub mod error;
pub mod time;

pub use asset::*;
pub use identifiers::*;
pub use error::*;
pub use time::*;
