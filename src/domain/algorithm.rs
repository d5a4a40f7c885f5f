use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown algorithm: {0}")]
pub struct UnknownAlgorithm(pub String);

macro_rules! algorithms {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Proof-of-work hashing algorithms reported by the pools.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum Algorithm {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl Algorithm {
            pub const ALL: &'static [Algorithm] = &[$(Algorithm::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Algorithm::$variant => $name,)+
                }
            }
        }

        impl FromStr for Algorithm {
            type Err = UnknownAlgorithm;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Algorithm::$variant),)+
                    other => Err(UnknownAlgorithm(other.to_string())),
                }
            }
        }
    };
}

algorithms! {
    Axiom => "axiom",
    Bastion => "bastion",
    Bitcore => "bitcore",
    Blake => "blake",
    Blake256r14 => "blake256r14",
    Blake256r8 => "blake256r8",
    Blake256r8vnl => "blake256r8vnl",
    Blake2b => "blake2b",
    Blake2s => "blake2s",
    Blakecoin => "blakecoin",
    Bmw => "bmw",
    C11 => "c11",
    Cryptonight => "cryptonight",
    Daggerhashimoto => "daggerhashimoto",
    Decred => "decred",
    Deep => "deep",
    Equihash => "equihash",
    Ethash => "ethash",
    Fresh => "fresh",
    Fugue256 => "fugue256",
    Groestl => "groestl",
    Hmq1725 => "hmq1725",
    Hodl => "hodl",
    Hsr => "hsr",
    Jackpot => "jackpot",
    Jha => "jha",
    Keccak => "keccak",
    Lbry => "lbry",
    Luffa => "luffa",
    Lyra2 => "lyra2",
    Lyra2re => "lyra2re",
    Lyra2re2 => "lyra2re2",
    Lyra2rev2 => "lyra2rev2",
    Lyra2v2 => "lyra2v2",
    Lyra2z => "lyra2z",
    M7m => "m7m",
    MyrGr => "myr-gr",
    Myriad => "myriad",
    Neoscrypt => "neoscrypt",
    Nist5 => "nist5",
    Pascal => "pascal",
    Penta => "penta",
    Phi => "phi",
    Polytimos => "polytimos",
    Quark => "quark",
    Qubit => "qubit",
    S3 => "s3",
    Scrypt => "scrypt",
    Scryptjanenf16 => "scryptjanenf16",
    Scryptnf => "scryptnf",
    Sha256 => "sha256",
    Sha256d => "sha256d",
    Sha256t => "sha256t",
    Sia => "sia",
    Sib => "sib",
    Skein => "skein",
    Skein2 => "skein2",
    Skunk => "skunk",
    Timetravel => "timetravel",
    Tribus => "tribus",
    Vanilla => "vanilla",
    Veltor => "veltor",
    Whirlpool => "whirlpool",
    Whirlpoolx => "whirlpoolx",
    X11 => "x11",
    X11evo => "x11evo",
    X11ghost => "x11ghost",
    X13 => "x13",
    X14 => "x14",
    X15 => "x15",
    X17 => "x17",
    Xevan => "xevan",
    Yescrypt => "yescrypt",
    Zr5 => "zr5",
}

const KILO_HASH: f64 = 1e3;
const MEGA_HASH: f64 = 1e6;
const GIGA_HASH: f64 = 1e9;

impl Algorithm {
    /// Hash-rate divisor the pools quote profitability against.
    pub fn base_units(&self) -> f64 {
        match self {
            Algorithm::Blake2s | Algorithm::Blakecoin | Algorithm::Qubit => GIGA_HASH,
            Algorithm::Yescrypt => KILO_HASH,
            _ => MEGA_HASH,
        }
    }

    pub fn unit_label(&self) -> &'static str {
        match self.base_units() {
            u if u == GIGA_HASH => "GH/s",
            u if u == KILO_HASH => "KH/s",
            _ => "MH/s",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Algorithm::Blake2s, 1e9, "GH/s")]
    #[case(Algorithm::Blakecoin, 1e9, "GH/s")]
    #[case(Algorithm::Qubit, 1e9, "GH/s")]
    #[case(Algorithm::Yescrypt, 1e3, "KH/s")]
    #[case(Algorithm::Equihash, 1e6, "MH/s")]
    #[case(Algorithm::X11, 1e6, "MH/s")]
    fn test_base_units(#[case] algo: Algorithm, #[case] divisor: f64, #[case] label: &str) {
        assert_eq!(algo.base_units(), divisor);
        assert_eq!(algo.unit_label(), label);
    }

    #[test]
    fn test_names_round_trip_through_from_str() {
        assert_eq!(Algorithm::ALL.len(), 74);
        for algo in Algorithm::ALL {
            assert_eq!(algo.as_str().parse::<Algorithm>(), Ok(*algo));
        }
        assert_eq!("myr-gr".parse::<Algorithm>(), Ok(Algorithm::MyrGr));
        assert!("sha512".parse::<Algorithm>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&Algorithm::MyrGr).unwrap();
        assert_eq!(json, "\"myr-gr\"");
        let parsed: Algorithm = serde_json::from_str("\"lyra2rev2\"").unwrap();
        assert_eq!(parsed, Algorithm::Lyra2rev2);
    }
}
