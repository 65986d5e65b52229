use crate::metrics::Snapshot;
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// An observable computed over a sequence of recorded snapshots.
pub trait Obs {
    fn update(&mut self, snapshot: &Snapshot) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Fraction of agents that reported happy, over the whole run.
pub struct HappyFraction {
    acc: Accumulator,
}

impl HappyFraction {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for HappyFraction {
    fn update(&mut self, snapshot: &Snapshot) -> Result<()> {
        // The initial state carries no activation results.
        if snapshot.step == 0 || snapshot.agents == 0 {
            return Ok(());
        }
        self.acc
            .add(snapshot.happy as f64 / snapshot.agents as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "happy_fraction": self.acc.report() })
    }
}

/// Per-kind average utility, over the whole run.
pub struct AvgUtility {
    majority: Accumulator,
    minority: Accumulator,
}

impl AvgUtility {
    pub fn new() -> Self {
        Self {
            majority: Accumulator::new(),
            minority: Accumulator::new(),
        }
    }
}

impl Obs for AvgUtility {
    fn update(&mut self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.step == 0 {
            return Ok(());
        }
        self.majority.add(snapshot.avg_utility_majority);
        self.minority.add(snapshot.avg_utility_minority);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "avg_utility": {
                "majority": self.majority.report(),
                "minority": self.minority.report(),
            }
        })
    }
}

/// First step in which every agent was happy, if the run converged.
pub struct Convergence {
    converged_at: Option<usize>,
}

impl Convergence {
    pub fn new() -> Self {
        Self { converged_at: None }
    }
}

impl Obs for Convergence {
    fn update(&mut self, snapshot: &Snapshot) -> Result<()> {
        if self.converged_at.is_none()
            && snapshot.step > 0
            && snapshot.happy == snapshot.agents
        {
            self.converged_at = Some(snapshot.step);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "convergence_step": self.converged_at })
    }
}

/// Runs every observable over the recorded metrics files of one run.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new() -> Self {
        let mut obs_ptr_vec: Vec<Box<dyn Obs>> = Vec::new();
        obs_ptr_vec.push(Box::new(HappyFraction::new()));
        obs_ptr_vec.push(Box::new(AvgUtility::new()));
        obs_ptr_vec.push(Box::new(Convergence::new()));
        Self { obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        let snapshots: Vec<Snapshot> =
            decode::from_read(&mut reader).context("failed to read snapshots")?;
        for snapshot in &snapshots {
            for obs in &mut self.obs_ptr_vec {
                obs.update(snapshot).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
