//! Per-identity estimator bookkeeping

use std::collections::{BTreeMap, HashMap};

use super::{Estimator, EstimatorConfig, EstimatorState, StateEstimator};
use crate::config::ConfigError;

/// Owns one estimator per track id.
///
/// Estimators are created lazily on the first update for an id and all
/// share the registry's configuration. With a fixed seed every new
/// estimator gets `seed + n`, n counting the estimators created so far.
#[derive(Debug)]
pub struct EstimatorRegistry {
    config: EstimatorConfig,
    estimators: HashMap<String, Estimator>,
    created: u64,
}

impl EstimatorRegistry {
    pub fn new(config: EstimatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(EstimatorRegistry {
            config,
            estimators: HashMap::new(),
            created: 0,
        })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Feed a measurement to the estimator for `track_id`, creating it on
    /// first sight. Returns the post-update state.
    pub fn update_track(&mut self, track_id: &str, x: f64, y: f64) -> EstimatorState {
        if !self.estimators.contains_key(track_id) {
            let seed = self.config.seed.map(|s| s.wrapping_add(self.created));
            self.created += 1;
            log::debug!(
                "New {} estimator for track {}",
                self.config.kind,
                track_id
            );
            self.estimators
                .insert(track_id.to_string(), Estimator::build(&self.config, seed));
        }

        match self.estimators.get_mut(track_id) {
            Some(estimator) => {
                estimator.process(x, y);
                estimator.state()
            }
            None => EstimatorState::new(x, y, 0.0, 0.0),
        }
    }

    /// Advance the estimator for `track_id` one step; `None` for unknown ids
    pub fn predict_track(&mut self, track_id: &str) -> Option<(f64, f64)> {
        self.estimators
            .get_mut(track_id)
            .filter(|e| e.is_initialized())
            .map(|e| e.predict())
    }

    /// Position the estimator for `track_id` would predict next, computed on
    /// a copy so the live estimator is left as it was
    pub fn peek_track(&self, track_id: &str) -> Option<(f64, f64)> {
        self.estimators
            .get(track_id)
            .filter(|e| e.is_initialized())
            .map(|e| e.clone().predict())
    }

    pub fn state(&self, track_id: &str) -> Option<EstimatorState> {
        self.estimators.get(track_id).map(|e| e.state())
    }

    /// Drop the estimator for `track_id`. Returns whether one existed.
    pub fn remove_track(&mut self, track_id: &str) -> bool {
        self.estimators.remove(track_id).is_some()
    }

    /// Re-key the estimator of `from` to `to`, keeping its state.
    ///
    /// An existing estimator under `to` wins and the one under `from` is
    /// dropped.
    pub fn transfer_track(&mut self, from: &str, to: &str) -> bool {
        let Some(estimator) = self.estimators.remove(from) else {
            return false;
        };
        if self.estimators.contains_key(to) {
            return false;
        }
        self.estimators.insert(to.to_string(), estimator);
        true
    }

    /// Snapshot of every estimator, ordered by track id
    pub fn all_states(&self) -> BTreeMap<String, EstimatorState> {
        self.estimators
            .iter()
            .map(|(id, e)| (id.clone(), e.state()))
            .collect()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.estimators.contains_key(track_id)
    }

    pub fn len(&self) -> usize {
        self.estimators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::EstimatorKind;

    fn particle_config(seed: u64) -> EstimatorConfig {
        EstimatorConfig {
            kind: EstimatorKind::Particle,
            ensemble_size: 64,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_lazy_creation() {
        let mut registry = EstimatorRegistry::new(EstimatorConfig::default()).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.predict_track("F1"), None);

        assert_eq!(
            registry.update_track("F1", 3.0, 4.0),
            EstimatorState::new(3.0, 4.0, 0.0, 0.0)
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("F1"));
        assert!(registry.predict_track("F1").is_some());
        assert_eq!(registry.predict_track("F2"), None);
    }

    #[test]
    fn test_peek_leaves_estimator_untouched() {
        for config in [EstimatorConfig::default(), particle_config(9)] {
            let mut registry = EstimatorRegistry::new(config).unwrap();
            assert_eq!(registry.peek_track("R1"), None);
            for i in 0..5 {
                registry.update_track("R1", 2.0 * i as f64, 1.0);
            }
            let before = registry.state("R1");

            let peeked = registry.peek_track("R1");
            assert_eq!(registry.peek_track("R1"), peeked);
            assert_eq!(registry.state("R1"), before);

            // The copy predicts exactly what the live estimator would
            assert_eq!(registry.predict_track("R1"), peeked);
            assert_ne!(registry.state("R1"), before);
        }
    }

    #[test]
    fn test_tracks_are_independent() {
        let mut registry = EstimatorRegistry::new(EstimatorConfig::default()).unwrap();
        registry.update_track("A", 0.0, 0.0);
        registry.update_track("B", 100.0, 100.0);
        registry.update_track("A", 1.0, 0.0);

        let states = registry.all_states();
        assert_eq!(states.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!((states["B"].x, states["B"].y), (100.0, 100.0));
        assert!(states["A"].x > 0.0);
    }

    #[test]
    fn test_remove_and_transfer() {
        let mut registry = EstimatorRegistry::new(EstimatorConfig::default()).unwrap();
        registry.update_track("R1", 5.0, 5.0);
        registry.update_track("R1", 6.0, 5.0);
        let before = registry.state("R1").unwrap();

        assert!(registry.transfer_track("R1", "F9"));
        assert!(!registry.contains("R1"));
        assert_eq!(registry.state("F9"), Some(before));

        assert!(!registry.transfer_track("R1", "F9"));
        assert!(registry.remove_track("F9"));
        assert!(!registry.remove_track("F9"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_transfer_keeps_existing_target() {
        let mut registry = EstimatorRegistry::new(EstimatorConfig::default()).unwrap();
        registry.update_track("A1", 1.0, 1.0);
        registry.update_track("F1", 2.0, 2.0);

        assert!(!registry.transfer_track("A1", "F1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state("F1").map(|s| s.x), Some(2.0));
    }

    #[test]
    fn test_seeded_registries_replay() {
        let mut a = EstimatorRegistry::new(particle_config(100)).unwrap();
        let mut b = EstimatorRegistry::new(particle_config(100)).unwrap();
        for i in 0..5 {
            let t = i as f64;
            for id in ["X", "Y"] {
                assert_eq!(a.update_track(id, t, -t), b.update_track(id, t, -t));
            }
        }
        assert_eq!(a.all_states(), b.all_states());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EstimatorConfig {
            dt: 0.0,
            ..Default::default()
        };
        assert_eq!(
            EstimatorRegistry::new(config).unwrap_err(),
            ConfigError::TimeStep(0.0)
        );
    }
}
