pub mod algorithm;
pub mod currency;
pub mod pool;
pub mod record;
pub mod rig_profile;
pub mod user;

pub use algorithm::Algorithm;
pub use currency::{format_amount, DigitalCurrency, DigitalCurrencyAmount};
pub use pool::{KeyedPoolCurrent, Pool, PoolCurrent, PoolTarget};
pub use record::{
    Granularity, GranularityKind, PerDay, PerHour, PerMinute, PoolAlgoData, PoolAlgoRecord,
    PoolAlgoRollupRecord, ProfitabilityRecord, TimeseriesPoint,
};
pub use rig_profile::RigProfile;
pub use user::{Bookmark, PoolWallet, PoolWallets, UserProfile};
