use super::auth::AuthSession;
use super::error_handling::{ErrorContext, MinerStatsError};
use super::at_path;
use crate::domain::RigProfile;
use crate::repository::{paths, DatabaseAdaptor, ListOptions};
use crate::rx::{combine_latest2, Feed, SharedFeeds};
use anyhow::Result;
use std::collections::BTreeMap;
use tracing::info;
use uuid::Uuid;

pub type RigProfiles = BTreeMap<String, RigProfile>;

/// Global rig profiles overlaid with the signed-in user's own.
#[derive(Clone)]
pub struct RigProfileService {
    adaptor: DatabaseAdaptor,
    auth: AuthSession,
    merged: SharedFeeds<(), RigProfiles>,
}

impl RigProfileService {
    pub fn new(adaptor: DatabaseAdaptor, auth: AuthSession) -> Self {
        Self {
            adaptor,
            auth,
            merged: SharedFeeds::new(),
        }
    }

    /// Every profile by uuid; a user profile replaces a global one with the same uuid.
    pub fn rig_profiles(&self) -> Feed<RigProfiles> {
        let adaptor = self.adaptor.clone();
        let uid = self.auth.user_id();
        self.merged.share((), move || {
            uid.switch_map(move |uid| {
                let adaptor = adaptor.clone();
                at_path(paths::user_rig_profiles(&uid), move |user_path| {
                    let global = adaptor.list_entries(&paths::global_rig_profiles(), ListOptions::default());
                    let user = adaptor.list_entries(&user_path, ListOptions::default());
                    combine_latest2(global, user, |global, user| {
                        global.iter().chain(user.iter()).cloned().collect()
                    })
                })
            })
        })
    }

    /// The user's profile with this uuid, otherwise the global one.
    pub fn rig_profile(&self, uuid: &str) -> Feed<Option<RigProfile>> {
        let adaptor = self.adaptor.clone();
        let uuid = uuid.to_string();
        self.auth.user_id().switch_map(move |uid| {
            let adaptor = adaptor.clone();
            let uuid = uuid.clone();
            at_path(paths::user_rig_profile(&uid, &uuid), move |user_path| {
                adaptor.object(&user_path).switch_map(move |profile| match profile {
                    Some(profile) => Feed::constant(Some(profile)),
                    None => at_path(paths::global_rig_profile(&uuid), |global_path| {
                        adaptor.object(&global_path)
                    }),
                })
            })
        })
    }

    pub fn default_rig_profile(&self) -> Feed<Option<String>> {
        let adaptor = self.adaptor.clone();
        self.auth.user_id().switch_map(move |uid| {
            at_path(paths::user_default_rig_profile(&uid), |path| adaptor.object(&path))
        })
    }

    pub async fn set_default_rig_profile(&self, uuid: &str) -> Result<()> {
        let uid = self.auth.require_uid("set default rig profile")?;
        let path = paths::user_default_rig_profile(&uid).map_err(MinerStatsError::from)?;
        ErrorContext::new("set_default_rig_profile")
            .with_detail("uuid", uuid)
            .wrap(self.adaptor.set_object(&path, &uuid.to_string()).await)
    }

    /// Stores `profile` in the user's set under `uuid`, or a fresh uuid when
    /// none is given. Returns the uuid used.
    pub async fn save_rig_profile(&self, uuid: Option<&str>, profile: &RigProfile) -> Result<String> {
        let uid = self.auth.require_uid("save rig profile")?;
        let uuid = uuid
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let path = paths::user_rig_profile(&uid, &uuid).map_err(MinerStatsError::from)?;
        ErrorContext::new("save_rig_profile")
            .with_detail("uuid", &uuid)
            .wrap(self.adaptor.set_object(&path, profile).await)?;
        info!(uuid = %uuid, name = %profile.name, "rig profile saved");
        Ok(uuid)
    }

    pub async fn delete_rig_profile(&self, uuid: &str) -> Result<()> {
        let uid = self.auth.require_uid("delete rig profile")?;
        let path = paths::user_rig_profile(&uid, uuid).map_err(MinerStatsError::from)?;
        ErrorContext::new("delete_rig_profile")
            .with_detail("uuid", uuid)
            .wrap(self.adaptor.remove_object(&path).await)
    }
}
