use crate::domain::{Algorithm, RigProfile};
use crate::services::RigProfileService;
use anyhow::Result;
use std::collections::BTreeMap;

/// Editable form of a rig profile. Values are shown per thousand base units.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RigProfileForm {
    pub uuid: Option<String>,
    pub name: String,
    pub values: BTreeMap<Algorithm, f64>,
}

impl RigProfileForm {
    pub fn from_profile(uuid: Option<String>, profile: &RigProfile) -> Self {
        let values = profile
            .hashrates
            .iter()
            .map(|(algo, hashrate)| (*algo, hashrate * 1000.0 / algo.base_units()))
            .collect();
        Self {
            uuid,
            name: profile.name.clone(),
            values,
        }
    }

    /// Sets or clears the displayed value for `algo`.
    pub fn set_value(&mut self, algo: Algorithm, value: Option<f64>) {
        match value {
            Some(value) => {
                self.values.insert(algo, value);
            }
            None => {
                self.values.remove(&algo);
            }
        }
    }

    pub fn to_profile(&self) -> RigProfile {
        RigProfile {
            name: self.name.clone(),
            hashrates: self
                .values
                .iter()
                .map(|(algo, value)| (*algo, value / 1000.0 * algo.base_units()))
                .collect(),
        }
    }

    /// Saves under the form's uuid, or a new one. Returns the uuid used.
    pub async fn save(&self, service: &RigProfileService) -> Result<String> {
        service
            .save_rig_profile(self.uuid.as_deref(), &self.to_profile())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_scaling() {
        let profile = RigProfile::new("rig")
            .with_hashrate(Algorithm::X11, 2_000.0)
            .with_hashrate(Algorithm::Blake2s, 3e6);
        let form = RigProfileForm::from_profile(Some("p1".to_string()), &profile);

        assert!((form.values[&Algorithm::X11] - 2.0).abs() < 1e-9);
        assert!((form.values[&Algorithm::Blake2s] - 3.0).abs() < 1e-9);

        let saved = form.to_profile();
        assert!((saved.hashrate(Algorithm::X11) - 2_000.0).abs() < 1e-6);
        assert!((saved.hashrate(Algorithm::Blake2s) - 3e6).abs() < 1e-3);
        assert_eq!(saved.name, "rig");
    }

    #[test]
    fn test_cleared_values_are_not_saved() {
        let mut form = RigProfileForm::default();
        form.set_value(Algorithm::Equihash, Some(1.0));
        form.set_value(Algorithm::Scrypt, Some(4.0));
        form.set_value(Algorithm::Scrypt, None);

        let profile = form.to_profile();
        assert_eq!(profile.hashrates.len(), 1);
        assert!((profile.hashrate(Algorithm::Equihash) - 1_000.0).abs() < 1e-9);
    }
}
