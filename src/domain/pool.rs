use super::algorithm::Algorithm;
use super::currency::{DigitalCurrency, DigitalCurrencyAmount};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pool: {0}")]
pub struct UnknownPool(pub String);

/// Mining pools the ingestion process scrapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    Ahashpool,
    Miningpoolhub,
    Nicehash,
    Nanopool,
}

impl Pool {
    pub const ALL: &'static [Pool] = &[
        Pool::Ahashpool,
        Pool::Miningpoolhub,
        Pool::Nicehash,
        Pool::Nanopool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Pool::Ahashpool => "ahashpool",
            Pool::Miningpoolhub => "miningpoolhub",
            Pool::Nicehash => "nicehash",
            Pool::Nanopool => "nanopool",
        }
    }

    /// Pools that report per algorithm, stored under `v2/pool/algo`.
    pub fn is_algo_focused(&self) -> bool {
        !self.is_coin_focused()
    }

    /// Pools that report per coin, stored under `v2/pool/coin`.
    pub fn is_coin_focused(&self) -> bool {
        matches!(self, Pool::Nanopool)
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pool {
    type Err = UnknownPool;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pool::ALL
            .iter()
            .copied()
            .find(|pool| pool.as_str() == s)
            .ok_or_else(|| UnknownPool(s.to_string()))
    }
}

/// What a pool-current record is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolTarget {
    Algo(Algorithm),
    Coin(DigitalCurrency),
}

impl fmt::Display for PoolTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolTarget::Algo(algo) => write!(f, "{algo}"),
            PoolTarget::Coin(coin) => write!(f, "{coin}"),
        }
    }
}

/// Latest profitability snapshot for one pool and algorithm or coin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolCurrent {
    pub pool: Pool,
    pub algo: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coin: Option<DigitalCurrency>,
    #[serde(default)]
    pub amount: DigitalCurrencyAmount,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_worker_proportion: Option<f64>,
}

impl PoolCurrent {
    /// A coin, when present, identifies the record; otherwise the algorithm does.
    pub fn target(&self) -> PoolTarget {
        match self.coin {
            Some(coin) => PoolTarget::Coin(coin),
            None => PoolTarget::Algo(self.algo),
        }
    }

    pub fn is_coin(&self) -> bool {
        self.coin.is_some()
    }

    /// `pool/coin` or `pool/algo`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.pool, self.target())
    }

    /// Label used for display and filtering.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.pool, self.algo)
    }
}

/// A snapshot record rescaled for a rig profile, with its key attached.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedPoolCurrent {
    pub key: String,
    pub current: PoolCurrent,
}
