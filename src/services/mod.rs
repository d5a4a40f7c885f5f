pub mod auth;
pub mod bookmarks_service;
pub mod context_service;
pub mod error_handling;
pub mod metrics_service;
pub mod rig_profile_service;
pub mod visibility;
pub mod wallets_service;

pub use auth::{AuthSession, AuthUser};
pub use bookmarks_service::BookmarksService;
pub use context_service::ContextService;
pub use error_handling::{ErrorContext, LogHelper, MinerStatsError, UserErrorFormatter};
pub use metrics_service::{Clock, FixedClock, MetricsService, SystemClock};
pub use rig_profile_service::{RigProfileService, RigProfiles};
pub use visibility::{pause_when_invisible, VisibilitySignal};
pub use wallets_service::{BalanceClient, HttpBalanceClient, WalletsService};

use crate::repository::RepositoryResult;
use crate::rx::{Feed, FeedError, Item};

/// Builds a feed at a checked path; an invalid path becomes a failed feed.
pub(crate) fn at_path<P, T, F>(path: RepositoryResult<P>, build: F) -> Feed<T>
where
    T: Item,
    F: FnOnce(P) -> Feed<T>,
{
    match path {
        Ok(path) => build(path),
        Err(err) => Feed::failed(FeedError::new(err.to_string())),
    }
}
