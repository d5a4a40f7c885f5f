use super::at_path;
use super::auth::AuthSession;
use super::error_handling::{ErrorContext, MinerStatsError};
use crate::domain::Bookmark;
use crate::repository::{paths, DatabaseAdaptor, ListOptions};
use crate::rx::{Feed, SharedFeeds};
use anyhow::Result;
use tracing::info;

#[derive(Clone)]
pub struct BookmarksService {
    adaptor: DatabaseAdaptor,
    auth: AuthSession,
    entries: SharedFeeds<(), Vec<(String, Bookmark)>>,
}

impl BookmarksService {
    pub fn new(adaptor: DatabaseAdaptor, auth: AuthSession) -> Self {
        Self {
            adaptor,
            auth,
            entries: SharedFeeds::new(),
        }
    }

    fn entries(&self) -> Feed<Vec<(String, Bookmark)>> {
        let adaptor = self.adaptor.clone();
        let uid = self.auth.user_id();
        self.entries.share((), move || {
            uid.switch_map(move |uid| {
                at_path(paths::user_bookmark_pools(&uid), |path| {
                    adaptor.list_entries(&path, ListOptions::default())
                })
            })
        })
    }

    /// The user's bookmarks, empty when there are none.
    pub fn pool_coins_or_algos(&self) -> Feed<Vec<Bookmark>> {
        self.entries()
            .map(|entries| entries.into_iter().map(|(_, bookmark)| bookmark).collect())
    }

    pub async fn add_pool_coin_or_algo(&self, bookmark: Bookmark) -> Result<String> {
        let uid = self.auth.require_uid("add bookmark")?;
        let path = paths::user_bookmark_pools(&uid).map_err(MinerStatsError::from)?;
        let key = ErrorContext::new("add_pool_coin_or_algo")
            .with_detail("pool", bookmark.pool())
            .wrap(self.adaptor.insert_object(&path, &bookmark).await)?;
        info!(key = %key, pool = %bookmark.pool(), "bookmark added");
        Ok(key)
    }

    /// Removes the stored entry equal to `bookmark`.
    pub async fn remove_pool_coin_or_algo(&self, bookmark: Bookmark) -> Result<()> {
        let uid = self.auth.require_uid("remove bookmark")?;
        let list = paths::user_bookmark_pools(&uid).map_err(MinerStatsError::from)?;
        let entries = match self
            .adaptor
            .list_entries(&list, ListOptions::default())
            .first()
            .await
        {
            Some(Ok(entries)) => entries,
            Some(Err(err)) => return Err(err.into()),
            None => Vec::new(),
        };

        let key = entries
            .into_iter()
            .find(|(_, stored)| *stored == bookmark)
            .map(|(key, _)| key)
            .ok_or(MinerStatsError::BookmarkNotFound)?;

        let path = paths::user_bookmark(&uid, &key).map_err(MinerStatsError::from)?;
        ErrorContext::new("remove_pool_coin_or_algo")
            .with_detail("key", &key)
            .wrap(self.adaptor.remove_object(&path).await)?;
        info!(key = %key, pool = %bookmark.pool(), "bookmark removed");
        Ok(())
    }
}
