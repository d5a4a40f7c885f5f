use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DigitalCurrency {
    #[default]
    BTC,
    ETC,
    ETH,
    ETN,
    PASC,
    SIA,
    XMR,
    ZEC,
}

impl DigitalCurrency {
    pub const ALL: &'static [DigitalCurrency] = &[
        DigitalCurrency::BTC,
        DigitalCurrency::ETC,
        DigitalCurrency::ETH,
        DigitalCurrency::ETN,
        DigitalCurrency::PASC,
        DigitalCurrency::SIA,
        DigitalCurrency::XMR,
        DigitalCurrency::ZEC,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DigitalCurrency::BTC => "BTC",
            DigitalCurrency::ETC => "ETC",
            DigitalCurrency::ETH => "ETH",
            DigitalCurrency::ETN => "ETN",
            DigitalCurrency::PASC => "PASC",
            DigitalCurrency::SIA => "SIA",
            DigitalCurrency::XMR => "XMR",
            DigitalCurrency::ZEC => "ZEC",
        }
    }
}

impl fmt::Display for DigitalCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DigitalCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DigitalCurrency::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown currency: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DigitalCurrencyAmount {
    #[serde(default)]
    pub currency: DigitalCurrency,
    #[serde(default)]
    pub amount: f64,
}

impl DigitalCurrencyAmount {
    pub fn new(currency: DigitalCurrency, amount: f64) -> Self {
        Self { currency, amount }
    }

    /// The amount shown when nothing better is known.
    pub fn zero_btc() -> Self {
        Self::new(DigitalCurrency::BTC, 0.0)
    }

    pub fn scaled(&self, multiplier: f64) -> Self {
        Self::new(self.currency, self.amount * multiplier)
    }
}

struct DisplayRule {
    symbol: &'static str,
    multiplier: f64,
    decimals: Option<usize>,
}

fn display_rule(currency: DigitalCurrency) -> DisplayRule {
    match currency {
        DigitalCurrency::BTC => DisplayRule {
            symbol: "m\u{0243}",
            multiplier: 1000.0,
            decimals: Some(3),
        },
        other => DisplayRule {
            symbol: other.as_str(),
            multiplier: 1.0,
            decimals: None,
        },
    }
}

static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,.][0-9]+").expect("fraction pattern is valid"));

/// Formats an amount for display; `-` when there is no amount at all.
pub fn format_amount(value: Option<&DigitalCurrencyAmount>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };

    let rule = display_rule(value.currency);
    let number = (value.amount * rule.multiplier).to_string();
    let formatted = match rule.decimals {
        Some(decimals) => FRACTION
            .replace(&number, |caps: &Captures| {
                let mut fraction: String = caps[0].chars().take(decimals + 1).collect();
                while fraction.len() < decimals + 1 {
                    fraction.push('0');
                }
                fraction
            })
            .into_owned(),
        None => number,
    };

    format!("{} {}", formatted, rule.symbol)
}
