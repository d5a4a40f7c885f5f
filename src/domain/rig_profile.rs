use super::algorithm::Algorithm;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Profitability is quoted per base unit of hash rate; hash rates are stored in MH/s.
const HASHRATE_SCALE: f64 = 1e6;

/// A named set of hash rates, one per algorithm the rig can mine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RigProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "known_hashrates")]
    pub hashrates: BTreeMap<Algorithm, f64>,
}

impl RigProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hashrates: BTreeMap::new(),
        }
    }

    pub fn with_hashrate(mut self, algo: Algorithm, hashrate: f64) -> Self {
        self.hashrates.insert(algo, hashrate);
        self
    }

    /// Profile that leaves pool amounts exactly as reported.
    pub fn identity() -> Self {
        let hashrates = Algorithm::ALL
            .iter()
            .map(|algo| (*algo, algo.base_units() / HASHRATE_SCALE))
            .collect();
        Self {
            name: "Per base unit".to_string(),
            hashrates,
        }
    }

    pub fn hashrate(&self, algo: Algorithm) -> f64 {
        self.hashrates.get(&algo).copied().unwrap_or(0.0)
    }

    /// Factor that turns a per-base-unit amount into this rig's earnings.
    pub fn multiplier(&self, algo: Algorithm) -> f64 {
        self.hashrate(algo) * HASHRATE_SCALE / algo.base_units()
    }
}

fn known_hashrates<'de, D>(deserializer: D) -> Result<BTreeMap<Algorithm, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, Option<f64>>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|(name, hashrate)| match (name.parse::<Algorithm>(), hashrate) {
            (Ok(algo), Some(hashrate)) => Some((algo, hashrate)),
            (Err(err), _) => {
                debug!(error = %err, "ignoring hash rate for unknown algorithm");
                None
            }
            _ => None,
        })
        .collect())
}
