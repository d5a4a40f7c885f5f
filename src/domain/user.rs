use super::algorithm::Algorithm;
use super::currency::DigitalCurrency;
use super::pool::{Pool, PoolCurrent};
use super::rig_profile::RigProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A pinned row of the profitability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bookmark {
    Coin { pool: Pool, coin: DigitalCurrency },
    Algo { pool: Pool, algo: Algorithm },
}

impl Bookmark {
    pub fn pool(&self) -> Pool {
        match self {
            Bookmark::Coin { pool, .. } | Bookmark::Algo { pool, .. } => *pool,
        }
    }

    /// Bookmark that pins `current`, following the pool's focus. A coin pool
    /// record without a coin cannot be pinned.
    pub fn for_current(current: &PoolCurrent) -> Option<Self> {
        if current.pool.is_coin_focused() {
            return current.coin.map(|coin| Bookmark::Coin {
                pool: current.pool,
                coin,
            });
        }
        Some(Bookmark::Algo {
            pool: current.pool,
            algo: current.algo,
        })
    }

    /// Coin bookmarks only match coin records, algo bookmarks only algo records.
    pub fn matches(&self, current: &PoolCurrent) -> bool {
        match self {
            Bookmark::Coin { pool, coin } => {
                *pool == current.pool && current.coin == Some(*coin)
            }
            Bookmark::Algo { pool, algo } => {
                *pool == current.pool && current.coin.is_none() && *algo == current.algo
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolWallet {
    #[serde(rename = "BTC", default, skip_serializing_if = "Option::is_none")]
    pub btc: Option<String>,
}

/// Wallet addresses keyed by pool name.
pub type PoolWallets = BTreeMap<String, PoolWallet>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserDefaults {
    #[serde(rename = "rig-profile", default, skip_serializing_if = "Option::is_none")]
    pub rig_profile: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserBookmarks {
    #[serde(default)]
    pub pools: BTreeMap<String, Bookmark>,
}

/// Everything stored under `v2/user/{uid}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub defaults: UserDefaults,
    #[serde(rename = "pool-wallet", default)]
    pub pool_wallet: PoolWallets,
    #[serde(rename = "rig-profile", default)]
    pub rig_profile: BTreeMap<String, RigProfile>,
    #[serde(default)]
    pub bookmarks: UserBookmarks,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn current(pool: Pool, algo: Algorithm, coin: Option<DigitalCurrency>) -> PoolCurrent {
        PoolCurrent {
            pool,
            algo,
            coin,
            amount: Default::default(),
            timestamp: 0,
            pool_worker_proportion: None,
        }
    }

    #[test]
    fn test_bookmark_wire_shapes() {
        let algo: Bookmark =
            serde_json::from_value(serde_json::json!({"pool": "nicehash", "algo": "x11"})).unwrap();
        assert_eq!(
            algo,
            Bookmark::Algo {
                pool: Pool::Nicehash,
                algo: Algorithm::X11
            }
        );

        let coin: Bookmark =
            serde_json::from_value(serde_json::json!({"pool": "nanopool", "coin": "ZEC"})).unwrap();
        assert_eq!(
            serde_json::to_value(coin).unwrap(),
            serde_json::json!({"pool": "nanopool", "coin": "ZEC"})
        );
    }

    #[test]
    fn test_bookmark_matching_respects_record_kind() {
        let zec = current(Pool::Nanopool, Algorithm::Equihash, Some(DigitalCurrency::ZEC));
        let x11 = current(Pool::Nicehash, Algorithm::X11, None);

        let coin = Bookmark::for_current(&zec).unwrap();
        assert!(coin.matches(&zec));
        assert!(!coin.matches(&x11));

        let algo = Bookmark::for_current(&x11).unwrap();
        assert!(algo.matches(&x11));
        assert!(!algo.matches(&current(Pool::Ahashpool, Algorithm::X11, None)));
        assert_eq!(
            Bookmark::for_current(&current(Pool::Nanopool, Algorithm::Equihash, None)),
            None
        );
    }

    #[test]
    fn test_user_profile_wire_names() {
        let json = serde_json::json!({
            "defaults": { "rig-profile": "abc" },
            "pool-wallet": { "ahashpool": { "BTC": "1Abc" } },
            "rig-profile": { "abc": { "name": "rig", "hashrates": { "x11": 1.5 } } }
        });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.defaults.rig_profile.as_deref(), Some("abc"));
        assert_eq!(profile.pool_wallet["ahashpool"].btc.as_deref(), Some("1Abc"));
        assert_eq!(profile.rig_profile["abc"].hashrate(Algorithm::X11), 1.5);
        assert!(profile.bookmarks.pools.is_empty());
    }
}
