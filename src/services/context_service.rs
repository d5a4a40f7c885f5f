use crate::domain::RigProfile;
use crate::rx::{Feed, Subject};

/// The selection shared by the dashboard's views: the active rig profile and
/// the table filter.
#[derive(Clone)]
pub struct ContextService {
    rig_profile: Subject<Option<RigProfile>>,
    filter: Subject<Option<String>>,
}

impl Default for ContextService {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextService {
    pub fn new() -> Self {
        Self {
            rig_profile: Subject::new(None),
            filter: Subject::new(None),
        }
    }

    pub fn update_rig_profile(&self, profile: Option<RigProfile>) {
        self.rig_profile.next(profile);
    }

    /// The selected profile; silent until one is selected.
    pub fn rig_profile(&self) -> Feed<RigProfile> {
        self.rig_profile.feed().filter_map(|profile| profile)
    }

    pub fn update_filter(&self, filter: Option<String>) {
        self.filter.next(filter);
    }

    pub fn filter(&self) -> Feed<Option<String>> {
        self.filter.feed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_rig_profile_waits_for_selection() {
        let context = ContextService::new();
        let mut profile = context.rig_profile();
        assert!(tokio::time::timeout(Duration::from_millis(20), profile.next()).await.is_err());

        context.update_rig_profile(Some(RigProfile::new("rig")));
        assert_eq!(profile.next().await.unwrap().unwrap().name, "rig");
    }

    #[tokio::test]
    async fn test_filter_starts_empty() {
        let context = ContextService::new();
        assert_eq!(context.filter().first().await, Some(Ok(None)));
        context.update_filter(Some("x11".to_string()));
        assert_eq!(context.filter().first().await, Some(Ok(Some("x11".to_string()))));
    }
}
