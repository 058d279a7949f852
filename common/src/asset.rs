//! The fixed set of tradable assets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

/// A tradable asset held in a wallet.
///
/// The set is closed: every asset shares identical wallet and pricing
/// behaviour, so variants only differ by the static metadata below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Usdt,
}

/// Static metadata table, indexed by [`Asset::ordinal`].
const METADATA: [AssetMetadata; 3] = [
    AssetMetadata {
        ticker: "BTC",
        provider_id: "bitcoin",
        name: "Bitcoin",
        decimal_places: 8,
    },
    AssetMetadata {
        ticker: "ETH",
        provider_id: "ethereum",
        name: "Ethereum",
        decimal_places: 18,
    },
    AssetMetadata {
        ticker: "USDT",
        provider_id: "tether",
        name: "Tether",
        decimal_places: 6,
    },
];

struct AssetMetadata {
    ticker: &'static str,
    provider_id: &'static str,
    name: &'static str,
    decimal_places: u32,
}

impl Asset {
    /// Every asset, in ordinal order.
    pub const ALL: [Asset; 3] = [Asset::Btc, Asset::Eth, Asset::Usdt];

    /// Stable position of the asset. Locks spanning several wallets are
    /// always acquired in ascending ordinal order.
    pub const fn ordinal(self) -> usize {
        match self {
            Asset::Btc => 0,
            Asset::Eth => 1,
            Asset::Usdt => 2,
        }
    }

    /// Ticker symbol, e.g. `BTC`.
    pub fn ticker(self) -> &'static str {
        METADATA[self.ordinal()].ticker
    }

    /// Canonical lowercase identifier used when asking a quote provider.
    pub fn provider_id(self) -> &'static str {
        METADATA[self.ordinal()].provider_id
    }

    /// Human readable name.
    pub fn name(self) -> &'static str {
        METADATA[self.ordinal()].name
    }

    /// Standard display precision.
    pub fn decimal_places(self) -> u32 {
        METADATA[self.ordinal()].decimal_places
    }

    /// Look an asset up by its provider identifier.
    pub fn from_provider_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.provider_id() == id)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ticker())
    }
}

impl FromStr for Asset {
    type Err = CommonError;

    /// Accepts a ticker (any case) or a provider identifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|a| a.ticker().eq_ignore_ascii_case(trimmed) || a.provider_id() == trimmed)
            .ok_or_else(|| CommonError::UnknownAsset(trimmed.to_string()))
    }
}
