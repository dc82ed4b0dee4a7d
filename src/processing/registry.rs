//! Latest observation per beacon, in discovery order

use crate::core::BeaconObservation;
use crate::validation::data::DataValidator;
use crate::validation::error::{ObservationError, PositioningError, PositioningResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// How the active set is chosen from the known beacons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First `n` beacons ever seen. Ignores signal quality.
    #[default]
    DiscoveryOrder,
    /// The `n` strongest current readings, ties resolved by discovery order
    StrongestSignal,
}

/// What an upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Default)]
pub struct BeaconRegistry {
    beacons: Vec<BeaconObservation>,
    index: HashMap<String, usize>,
    validator: DataValidator,
}

impl BeaconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validator(validator: DataValidator) -> Self {
        Self {
            validator,
            ..Self::default()
        }
    }

    /// Insert a new beacon at the end, or replace an existing one in place.
    /// Malformed observations leave the registry untouched.
    pub fn upsert(&mut self, observation: BeaconObservation) -> Result<UpsertOutcome, ObservationError> {
        self.validator.validate(&observation)?;

        match self.index.get(&observation.id) {
            Some(&slot) => {
                debug!(id = %observation.id, rssi = observation.rssi, "updated beacon");
                self.beacons[slot] = observation;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                debug!(id = %observation.id, rssi = observation.rssi, known = self.beacons.len() + 1, "discovered beacon");
                self.index.insert(observation.id.clone(), self.beacons.len());
                self.beacons.push(observation);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&BeaconObservation> {
        self.index.get(id).map(|&slot| &self.beacons[slot])
    }

    /// Beacons in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &BeaconObservation> {
        self.beacons.iter()
    }

    pub fn clear(&mut self) {
        self.beacons.clear();
        self.index.clear();
    }

    /// First `n` beacons in discovery order
    pub fn select_active_set(&self, n: usize) -> PositioningResult<&[BeaconObservation]> {
        if self.beacons.len() < n {
            return Err(PositioningError::NotEnoughBeacons {
                available: self.beacons.len(),
                required: n,
            });
        }
        Ok(&self.beacons[..n])
    }

    pub fn select_with_policy(&self, n: usize, policy: SelectionPolicy) -> PositioningResult<Vec<BeaconObservation>> {
        let discovery = self.select_active_set(n).map(|set| set.to_vec());
        match policy {
            SelectionPolicy::DiscoveryOrder => discovery,
            SelectionPolicy::StrongestSignal => {
                discovery?;
                let mut ranked: Vec<&BeaconObservation> = self.beacons.iter().collect();
                // stable sort keeps discovery order among equal readings
                ranked.sort_by(|a, b| b.rssi.total_cmp(&a.rssi));
                Ok(ranked.into_iter().take(n).cloned().collect())
            }
        }
    }
}

/// Registry shared between concurrent observation sources.
///
/// Writers are serialized by the mutex; estimation runs on a snapshot so the
/// lock is never held during the math.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<BeaconRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: BeaconRegistry) -> Self {
        Self {
            inner: Arc::new(Mutex::new(registry)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BeaconRegistry> {
        // a panicking writer cannot leave the registry half-updated
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn upsert(&self, observation: BeaconObservation) -> Result<UpsertOutcome, ObservationError> {
        self.lock().upsert(observation)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> BeaconRegistry {
        self.lock().clone()
    }
}
