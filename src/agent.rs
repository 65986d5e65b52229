//! Agent state and the relocation decision policy.
//!
//! An agent's utility is a convex combination of a commute term (how far its
//! cell is from the city center landmark, measured against Marchetti's ideal
//! commute) and a homophily term (how many of its Moore neighbors share its
//! type). Both terms are normalized into [-1, 1]. The agent compares the
//! total against an adaptive happiness threshold that drifts with its own
//! utility history.

use crate::config::Config;
use crate::grid::{Position, SpatialGrid};
use serde::{Deserialize, Serialize};

pub type AgentId = usize;

/// Side length of a grid cell, in meters.
pub const BLOCK_METERS: f64 = 1000.0;
/// Commute speed, in meters per hour.
pub const SPEED_METERS_PER_HOUR: f64 = 30_000.0;
/// Marchetti's constant: the commute time (minutes) below which travel
/// contributes positive utility.
pub const IDEAL_COMMUTE_MINUTES: f64 = 60.0;
/// Happiness threshold assigned to every agent at placement.
pub const INITIAL_THRESHOLD: f64 = 0.5;
/// Fraction of the remaining gap to 1 by which the threshold moves per update.
pub const LEARNING_RATE: f64 = 0.05;

/// Population class of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentKind {
    Majority,
    Minority,
}

/// A resident of the grid.
///
/// Plain data record; the decision policy lives in [`decide`] and the
/// orchestration in the simulation model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub kind: AgentKind,
    pub pos: Position,
    /// Adaptive utility cutoff below which the agent relocates. Initialized
    /// to [`INITIAL_THRESHOLD`], mutated only by this agent's own activations,
    /// and persists across relocations.
    pub happiness_threshold: f64,
    /// Total utility from the previous activation, the baseline for the next
    /// threshold update.
    pub last_utility: f64,
}

impl Agent {
    pub fn new(id: AgentId, kind: AgentKind, pos: Position) -> Self {
        Self {
            id,
            kind,
            pos,
            happiness_threshold: INITIAL_THRESHOLD,
            last_utility: 0.0,
        }
    }
}

/// Decision policy parameters, derived once from the configuration.
///
/// The normalization bounds are computed analytically from the grid extent
/// and the landmark position, never hardcoded for one grid size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionParams {
    pub preference_weight: f64,
    pub radius: usize,
    pub similar_weight: f64,
    /// Divisor normalizing the homophily utility.
    pub homophily_scale: f64,
    /// Commute time from the farthest cell to the landmark, in minutes.
    pub max_commute_minutes: f64,
}

/// Minutes of commute per block of Manhattan distance.
pub fn commute_minutes_per_block() -> f64 {
    BLOCK_METERS / SPEED_METERS_PER_HOUR * 60.0
}

/// Size of a full Moore neighborhood of the given radius.
pub fn moore_neighborhood_size(radius: usize) -> usize {
    (2 * radius + 1).pow(2) - 1
}

impl DecisionParams {
    pub fn new(cfg: &Config, landmark: Position) -> Self {
        let max_blocks = landmark.x.max(cfg.grid.width - 1 - landmark.x)
            + landmark.y.max(cfg.grid.height - 1 - landmark.y);
        let max_commute_minutes = max_blocks as f64 * commute_minutes_per_block();

        let homophily_scale = cfg.policy.homophily_scale.unwrap_or_else(|| {
            moore_neighborhood_size(cfg.policy.radius) as f64 * cfg.policy.similar_weight.max(1.0)
        });

        Self {
            preference_weight: cfg.policy.preference_weight,
            radius: cfg.policy.radius,
            similar_weight: cfg.policy.similar_weight,
            homophily_scale,
            max_commute_minutes,
        }
    }
}

/// Outcome of one activation, to be applied by the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Normalized travel utility, in [-1, 1].
    pub travel_utility: f64,
    /// Normalized homophily utility, in [-1, 1].
    pub homophily_utility: f64,
    /// Convex combination of the two components.
    pub total_utility: f64,
    /// Happiness threshold after the hysteresis update.
    pub threshold: f64,
    /// Whether the total utility fell below the updated threshold.
    pub wants_to_move: bool,
}

/// Evaluate one activation of `agent` against the current grid state.
///
/// Pure with respect to the simulation: reads neighbor occupancy and the
/// landmark position, mutates nothing. The model applies the returned
/// [`Decision`].
pub fn decide(
    agent: &Agent,
    grid: &SpatialGrid,
    agents: &[Agent],
    landmark: Position,
    params: &DecisionParams,
) -> Decision {
    let travel_utility = normalized_travel_utility(agent.pos, landmark, params);
    let homophily_utility = normalized_homophily_utility(agent, grid, agents, params);

    let theta = params.preference_weight;
    let total_utility = theta * travel_utility + (1.0 - theta) * homophily_utility;

    let threshold = updated_threshold(agent.happiness_threshold, total_utility, agent.last_utility);

    Decision {
        travel_utility,
        homophily_utility,
        total_utility,
        threshold,
        wants_to_move: total_utility < threshold,
    }
}

/// Travel utility of a cell, normalized piecewise into [-1, 1]: the positive
/// branch is divided by the largest attainable positive value (a commute of
/// zero) and the negative branch by the magnitude of the largest attainable
/// negative value (the farthest cell from the landmark).
fn normalized_travel_utility(pos: Position, landmark: Position, params: &DecisionParams) -> f64 {
    let commute_minutes = pos.manhattan(landmark) as f64 * commute_minutes_per_block();
    let travel_utility = IDEAL_COMMUTE_MINUTES - commute_minutes;

    if travel_utility < 0.0 {
        // Reachable only when the farthest commute exceeds the ideal one,
        // so the divisor is positive.
        travel_utility / (params.max_commute_minutes - IDEAL_COMMUTE_MINUTES)
    } else {
        travel_utility / IDEAL_COMMUTE_MINUTES
    }
}

/// Weighted same-type minus different-type neighbor count, divided by the
/// homophily scale. A configured scale may under-normalize, so the result is
/// clamped into [-1, 1].
fn normalized_homophily_utility(
    agent: &Agent,
    grid: &SpatialGrid,
    agents: &[Agent],
    params: &DecisionParams,
) -> f64 {
    let mut similar = 0.0;
    let mut unsimilar = 0.0;
    for id in grid.neighbors(agent.pos, params.radius) {
        if agents[id].kind == agent.kind {
            similar += 1.0;
        } else {
            unsimilar += 1.0;
        }
    }

    let homophily_utility = params.similar_weight * similar - unsimilar;
    (homophily_utility / params.homophily_scale).clamp(-1.0, 1.0)
}

/// Hysteresis update: the threshold rises toward 1 by a fixed fraction of the
/// remaining gap when utility improved, falls symmetrically when it worsened,
/// and stays put when it is unchanged.
fn updated_threshold(threshold: f64, total_utility: f64, last_utility: f64) -> f64 {
    if total_utility > last_utility {
        threshold + LEARNING_RATE * (1.0 - threshold)
    } else if total_utility < last_utility {
        threshold - LEARNING_RATE * (1.0 - threshold)
    } else {
        threshold
    }
}
