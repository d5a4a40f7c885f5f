use super::rig_profile_editor::RigProfileForm;
use crate::domain::{Algorithm, Pool};
use crate::rx::{combine_latest2, Feed, Subject};
use crate::services::{ContextService, RigProfileService};
use std::sync::LazyLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Every algorithm, every pool, and every `"{pool} - {algo}"` pair, sorted.
pub static SORTED_FILTER_NAMES: LazyLock<Vec<String>> = LazyLock::new(|| {
    let mut names: Vec<String> = Algorithm::ALL
        .iter()
        .map(|algo| algo.to_string())
        .chain(Pool::ALL.iter().map(|pool| pool.to_string()))
        .chain(Pool::ALL.iter().flat_map(|pool| {
            Algorithm::ALL
                .iter()
                .map(move |algo| format!("{pool} - {algo}"))
        }))
        .collect();
    names.sort();
    names
});

/// Suggestions containing `input`; everything when `input` is empty.
pub fn filter_name_options(input: &str) -> Vec<String> {
    if input.is_empty() {
        return SORTED_FILTER_NAMES.clone();
    }
    SORTED_FILTER_NAMES
        .iter()
        .filter(|name| name.contains(input))
        .cloned()
        .collect()
}

/// Filter box and rig-profile picker. Pushes the selection into the shared
/// context for as long as the panel lives.
pub struct ContextPanel {
    rig_profiles: RigProfileService,
    context: ContextService,
    selected: Subject<Option<String>>,
    tasks: Vec<JoinHandle<()>>,
}

impl ContextPanel {
    pub fn new(rig_profiles: RigProfileService, context: ContextService) -> Self {
        let selected = Subject::new(None::<String>);
        let mut tasks = Vec::new();

        let default_profile = rig_profiles.default_rig_profile();
        let selection = selected.clone();
        tasks.push(tokio::spawn(async move {
            if let Some(Ok(Some(uuid))) = default_profile.first().await {
                if selection.value().flatten().is_some() {
                    return;
                }
                debug!(uuid = %uuid, "applying default rig profile");
                selection.next(Some(uuid));
            }
        }));

        let mut resolved = combine_latest2(
            rig_profiles.rig_profiles(),
            selected.feed().filter_map(|uuid| uuid),
            |profiles, uuid| profiles.get(uuid).cloned(),
        );
        let target = context.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(Ok(profile)) = resolved.next().await {
                target.update_rig_profile(profile);
            }
        }));

        Self {
            rig_profiles,
            context,
            selected,
            tasks,
        }
    }

    pub fn select_rig_profile(&self, uuid: &str) {
        info!(uuid = %uuid, "rig profile selected");
        self.selected.next(Some(uuid.to_string()));
    }

    pub fn selected_rig_profile(&self) -> Option<String> {
        self.selected.value().flatten()
    }

    /// An empty filter clears it.
    pub fn set_filter(&self, text: &str) {
        let filter = (!text.is_empty()).then(|| text.to_string());
        self.context.update_filter(filter);
    }

    pub fn clear_filter(&self) {
        self.context.update_filter(None);
    }

    /// Suggestions for the current filter text.
    pub fn filter_options(&self) -> Feed<Vec<String>> {
        self.context
            .filter()
            .map(|filter| filter_name_options(filter.as_deref().unwrap_or("")))
    }

    /// Editor for the selected profile, or a blank one when nothing is selected.
    pub async fn edit_rig_profile(&self) -> RigProfileForm {
        let uuid = self.selected_rig_profile();
        let profiles = match self.rig_profiles.rig_profiles().first().await {
            Some(Ok(profiles)) => profiles,
            _ => Default::default(),
        };
        let profile = uuid
            .as_ref()
            .and_then(|uuid| profiles.get(uuid).cloned())
            .unwrap_or_default();
        RigProfileForm::from_profile(uuid, &profile)
    }
}

impl Drop for ContextPanel {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
