use crate::agent::AgentId;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Uniform random activation order, re-drawn every step.
///
/// Activation is strictly sequential, so later agents in a step observe the
/// occupancy changes made by earlier ones; the per-step shuffle avoids the
/// systematic bias a fixed scan order would introduce.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivationScheduler {
    agents: Vec<AgentId>,
}

impl ActivationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: AgentId) {
        self.agents.push(id);
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Draw a fresh uniform permutation of all registered agents.
    pub fn draw_order<R: Rng>(&self, rng: &mut R) -> Vec<AgentId> {
        let mut order = self.agents.clone();
        order.shuffle(rng);
        order
    }
}
