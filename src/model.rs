use crate::agent::{self, Agent, AgentId, AgentKind, DecisionParams};
use crate::config::Config;
use crate::grid::{Cell, Position, SpatialGrid};
use crate::metrics::{MetricsCollector, Snapshot};
use crate::scheduler::ActivationScheduler;
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Bernoulli;
use serde::{Deserialize, Serialize};

/// Per-step aggregate counters, reset at the start of every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepCounters {
    pub happy: usize,
    pub happy_with_travel: usize,
    pub happy_with_homophily: usize,
    pub agg_utility_majority: f64,
    pub agg_utility_minority: f64,
    pub avg_utility_majority: f64,
    pub avg_utility_minority: f64,
}

/// The segregation model: grid, agents, scheduler, landmark, RNG and the
/// convergence flag.
///
/// Owns all simulation state. Randomness is consumed in a fixed order
/// (placement draws, then one permutation per step, then relocation draws)
/// so a given seed reproduces a run bit-for-bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationModel {
    grid: SpatialGrid,
    agents: Vec<Agent>,
    scheduler: ActivationScheduler,
    landmark: Position,
    params: DecisionParams,
    metrics: MetricsCollector,
    counters: StepCounters,
    rng: ChaCha12Rng,
    n_majority: usize,
    n_minority: usize,
    step: usize,
    running: bool,
}

impl SimulationModel {
    /// Construct a model with a stochastic initial population.
    ///
    /// Places the landmark first, then occupies every remaining cell
    /// independently with probability `density`, assigning the minority kind
    /// with probability `minority_fraction`. Cells are visited in row-major
    /// order so that seeded runs are reproducible.
    pub fn new(cfg: &Config) -> Result<Self> {
        cfg.validate().context("invalid model configuration")?;

        let mut rng = match cfg.run.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let landmark = cfg.grid.landmark_position();
        let mut grid = SpatialGrid::new(cfg.grid.width, cfg.grid.height);
        grid.place(Cell::Landmark, landmark)
            .context("failed to place landmark")?;

        let occupy_dist = Bernoulli::new(cfg.population.density)?;
        let minority_dist = Bernoulli::new(cfg.population.minority_fraction)?;

        let mut agents = Vec::new();
        let mut scheduler = ActivationScheduler::new();
        for y in 0..cfg.grid.height {
            for x in 0..cfg.grid.width {
                let pos = Position { x, y };
                if pos == landmark || !occupy_dist.sample(&mut rng) {
                    continue;
                }
                let kind = if minority_dist.sample(&mut rng) {
                    AgentKind::Minority
                } else {
                    AgentKind::Majority
                };
                let id = agents.len();
                grid.place(Cell::Agent(id), pos)
                    .context("failed to place agent")?;
                scheduler.register(id);
                agents.push(Agent::new(id, kind, pos));
            }
        }

        Ok(Self::assemble(cfg, grid, agents, scheduler, landmark, rng))
    }

    /// Construct a model with a fixed initial population.
    ///
    /// Used for scenario tests and externally supplied configurations; the
    /// step dynamics are identical to [`SimulationModel::new`].
    pub fn from_placements(
        cfg: &Config,
        placements: &[(Position, AgentKind)],
    ) -> Result<Self> {
        cfg.validate().context("invalid model configuration")?;

        let rng = match cfg.run.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let landmark = cfg.grid.landmark_position();
        let mut grid = SpatialGrid::new(cfg.grid.width, cfg.grid.height);
        grid.place(Cell::Landmark, landmark)
            .context("failed to place landmark")?;

        let mut agents = Vec::new();
        let mut scheduler = ActivationScheduler::new();
        for &(pos, kind) in placements {
            let id = agents.len();
            grid.place(Cell::Agent(id), pos)
                .context("failed to place agent")?;
            scheduler.register(id);
            agents.push(Agent::new(id, kind, pos));
        }

        Ok(Self::assemble(cfg, grid, agents, scheduler, landmark, rng))
    }

    fn assemble(
        cfg: &Config,
        grid: SpatialGrid,
        agents: Vec<Agent>,
        scheduler: ActivationScheduler,
        landmark: Position,
        rng: ChaCha12Rng,
    ) -> Self {
        let n_minority = agents
            .iter()
            .filter(|agent| agent.kind == AgentKind::Minority)
            .count();
        let n_majority = agents.len() - n_minority;

        let mut model = Self {
            params: DecisionParams::new(cfg, landmark),
            grid,
            agents,
            scheduler,
            landmark,
            metrics: MetricsCollector::new(),
            counters: StepCounters::default(),
            rng,
            n_majority,
            n_minority,
            step: 0,
            running: true,
        };
        model.collect_snapshot();
        model
    }

    /// Perform one full simulation step.
    ///
    /// Resets the per-step counters, activates every agent in a fresh random
    /// order, finalizes the per-kind averages, records a snapshot, and clears
    /// `running` when every agent reported happy.
    ///
    /// The driver must check [`SimulationModel::running`] before calling this
    /// again; stepping a converged model is a caller error.
    pub fn step(&mut self) -> Result<()> {
        self.counters = StepCounters::default();

        for id in self.scheduler.draw_order(&mut self.rng) {
            self.activate(id)
                .with_context(|| format!("failed to activate agent {id}"))?;
        }

        self.counters.avg_utility_majority =
            kind_average(self.counters.agg_utility_majority, self.n_majority);
        self.counters.avg_utility_minority =
            kind_average(self.counters.agg_utility_minority, self.n_minority);

        self.step += 1;
        self.collect_snapshot();

        if self.counters.happy == self.scheduler.agent_count() {
            self.running = false;
        }

        Ok(())
    }

    fn activate(&mut self, id: AgentId) -> Result<()> {
        let decision = agent::decide(
            &self.agents[id],
            &self.grid,
            &self.agents,
            self.landmark,
            &self.params,
        );

        let agent = &mut self.agents[id];
        agent.happiness_threshold = decision.threshold;
        agent.last_utility = decision.total_utility;
        match agent.kind {
            AgentKind::Majority => self.counters.agg_utility_majority += decision.total_utility,
            AgentKind::Minority => self.counters.agg_utility_minority += decision.total_utility,
        }

        if decision.wants_to_move {
            // Threshold and last utility persist across the move.
            self.grid
                .relocate(&mut self.agents[id], &mut self.rng)
                .context("failed to relocate agent")?;
        } else {
            self.counters.happy += 1;
            if decision.travel_utility > 0.0 {
                self.counters.happy_with_travel += 1;
            }
            if decision.homophily_utility > 0.0 {
                self.counters.happy_with_homophily += 1;
            }
        }

        Ok(())
    }

    fn collect_snapshot(&mut self) {
        self.metrics.collect(Snapshot {
            step: self.step,
            agents: self.scheduler.agent_count(),
            happy: self.counters.happy,
            happy_with_travel: self.counters.happy_with_travel,
            happy_with_homophily: self.counters.happy_with_homophily,
            avg_utility_majority: self.counters.avg_utility_majority,
            avg_utility_minority: self.counters.avg_utility_minority,
            mean_happiness_threshold: self.mean_happiness_threshold(),
        });
    }

    /// False once every scheduled agent reported happy in the same step.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Completed steps.
    pub fn step_count(&self) -> usize {
        self.step
    }

    /// All agents, for rendering and diagnostics (position, kind, threshold).
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent_count(&self) -> usize {
        self.scheduler.agent_count()
    }

    pub fn landmark(&self) -> Position {
        self.landmark
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn counters(&self) -> &StepCounters {
        &self.counters
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn mean_happiness_threshold(&self) -> f64 {
        if self.agents.is_empty() {
            return 0.0;
        }
        let sum: f64 = self
            .agents
            .iter()
            .map(|agent| agent.happiness_threshold)
            .sum();
        sum / self.agents.len() as f64
    }
}

/// Average aggregate utility over a kind, defined as 0 for an absent kind.
fn kind_average(aggregate: f64, count: usize) -> f64 {
    if count > 0 {
        aggregate / count as f64
    } else {
        0.0
    }
}
