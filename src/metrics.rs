use serde::{Deserialize, Serialize};

/// Named model-level scalars recorded after each step.
///
/// Serialized as a map from metric name to value, one record per completed
/// step plus the initial state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Completed steps at the time of recording (0 for the initial state).
    pub step: usize,
    /// Total number of scheduled agents.
    pub agents: usize,
    /// Agents that reported happy this step.
    pub happy: usize,
    /// Happy agents whose normalized travel utility was positive.
    pub happy_with_travel: usize,
    /// Happy agents whose normalized homophily utility was positive.
    pub happy_with_homophily: usize,
    pub avg_utility_majority: f64,
    pub avg_utility_minority: f64,
    pub mean_happiness_threshold: f64,
}

/// Append-only recorder of per-step snapshots.
///
/// Pure observer: reads model scalars, never influences the simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsCollector {
    snapshots: Vec<Snapshot>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collect(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }
}
