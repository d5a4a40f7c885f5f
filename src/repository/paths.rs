//! Typed locations in the realtime tree.
//!
//! Each path carries the record type stored at (or under) it, so the adaptor
//! can only ever decode a location into the type the schema puts there.

use super::error::{RepositoryError, RepositoryResult};
use crate::domain::{
    Algorithm, Bookmark, GranularityKind, Pool, PoolCurrent, PoolTarget, PoolWallets, RigProfile,
};
use crate::domain::user::UserBookmarks;
use std::fmt;
use std::marker::PhantomData;

const FORBIDDEN: &[char] = &['/', '.', '#', '$', '[', ']'];

fn validate(segments: Vec<String>) -> RepositoryResult<Vec<String>> {
    if let Some(bad) = segments
        .iter()
        .find(|segment| segment.is_empty() || segment.contains(FORBIDDEN))
    {
        return Err(RepositoryError::InvalidPath {
            path: segments.join("/"),
            segment: bad.clone(),
        });
    }
    Ok(segments)
}

fn owned(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|s| s.to_string()).collect()
}

/// Location of a single record of type `T`.
pub struct ObjectPath<T> {
    segments: Vec<String>,
    _record: PhantomData<fn() -> T>,
}

/// Location whose children are records of type `T`.
pub struct ListPath<T> {
    segments: Vec<String>,
    _record: PhantomData<fn() -> T>,
}

macro_rules! path_common {
    ($name:ident) => {
        impl<T> $name<T> {
            fn checked(segments: Vec<String>) -> RepositoryResult<Self> {
                Ok(Self {
                    segments: validate(segments)?,
                    _record: PhantomData,
                })
            }

            fn trusted(segments: Vec<String>) -> Self {
                debug_assert!(validate(segments.clone()).is_ok());
                Self {
                    segments,
                    _record: PhantomData,
                }
            }

            pub fn segments(&self) -> &[String] {
                &self.segments
            }

            pub fn as_string(&self) -> String {
                self.segments.join("/")
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                Self {
                    segments: self.segments.clone(),
                    _record: PhantomData,
                }
            }
        }

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.segments == other.segments
            }
        }

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.as_string())
            }
        }

        impl<T> fmt::Display for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.as_string())
            }
        }
    };
}

path_common!(ObjectPath);
path_common!(ListPath);

impl<T> ListPath<T> {
    /// Path of one child of this list.
    pub fn child(&self, key: &str) -> RepositoryResult<ObjectPath<T>> {
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        ObjectPath::checked(segments)
    }
}

/// Most recently scraped value for every pool and algorithm or coin.
pub fn latest() -> ListPath<PoolCurrent> {
    ListPath::trusted(owned(&["v2", "pool", "latest"]))
}

/// Profitability history of one pool target. The granularity marker decides
/// whether raw samples or rollups live there.
pub fn profitability<G: GranularityKind>(
    pool: Pool,
    target: PoolTarget,
    algo: Algorithm,
) -> ListPath<G::Record> {
    let granularity = G::GRANULARITY.as_str();
    let segments = match target {
        PoolTarget::Algo(algo) => owned(&[
            "v2",
            "pool",
            "algo",
            pool.as_str(),
            algo.as_str(),
            "profitability",
            granularity,
        ]),
        PoolTarget::Coin(coin) => owned(&[
            "v2",
            "pool",
            "coin",
            pool.as_str(),
            coin.as_str(),
            algo.as_str(),
            "profitability",
            granularity,
        ]),
    };
    ListPath::trusted(segments)
}

pub fn global_rig_profiles() -> ListPath<RigProfile> {
    ListPath::trusted(owned(&["v2", "rig-profile"]))
}

pub fn global_rig_profile(uuid: &str) -> RepositoryResult<ObjectPath<RigProfile>> {
    global_rig_profiles().child(uuid)
}

fn user(uid: &str, rest: &[&str]) -> Vec<String> {
    let mut segments = owned(&["v2", "user", uid]);
    segments.extend(owned(rest));
    segments
}

pub fn user_rig_profiles(uid: &str) -> RepositoryResult<ListPath<RigProfile>> {
    ListPath::checked(user(uid, &["rig-profile"]))
}

pub fn user_rig_profile(uid: &str, uuid: &str) -> RepositoryResult<ObjectPath<RigProfile>> {
    user_rig_profiles(uid)?.child(uuid)
}

pub fn user_default_rig_profile(uid: &str) -> RepositoryResult<ObjectPath<String>> {
    ObjectPath::checked(user(uid, &["defaults", "rig-profile"]))
}

pub fn user_bookmarks(uid: &str) -> RepositoryResult<ObjectPath<UserBookmarks>> {
    ObjectPath::checked(user(uid, &["bookmarks"]))
}

pub fn user_bookmark_pools(uid: &str) -> RepositoryResult<ListPath<Bookmark>> {
    ListPath::checked(user(uid, &["bookmarks", "pools"]))
}

pub fn user_bookmark(uid: &str, key: &str) -> RepositoryResult<ObjectPath<Bookmark>> {
    user_bookmark_pools(uid)?.child(key)
}

pub fn user_pool_wallets(uid: &str) -> RepositoryResult<ObjectPath<PoolWallets>> {
    ObjectPath::checked(user(uid, &["pool-wallet"]))
}
