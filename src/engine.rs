use crate::config::Config;
use crate::metrics::Snapshot;
use crate::model::SimulationModel;
use anyhow::{Context, Result};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation driver.
///
/// Holds the configuration and the model, steps the model while it is
/// running (up to `max_steps` per invocation), writes the metric snapshots
/// produced by this invocation, and can checkpoint the whole state to resume
/// later.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    model: SimulationModel,
    /// Snapshots already written by previous invocations.
    persisted: usize,
}

impl Engine {
    /// Create a new `Engine` with a freshly constructed model.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let model = SimulationModel::new(&cfg).context("failed to construct model")?;
        Ok(Self {
            cfg,
            model,
            persisted: 0,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn model(&self) -> &SimulationModel {
        &self.model
    }

    /// Step the model until it converges or `max_steps` more steps have been
    /// performed, then write the snapshots new to this invocation (including
    /// the initial state for a fresh run) as a MessagePack file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let max_steps = self.cfg.run.max_steps;
        let log_every = max_steps.div_ceil(10);

        let mut performed = 0;
        while self.model.running() && performed < max_steps {
            self.model.step().context("failed to perform step")?;
            performed += 1;

            if performed % log_every == 0 {
                let progress = 100.0 * performed as f64 / max_steps as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        if self.model.running() {
            log::info!("performed {performed} steps without convergence");
        } else {
            log::info!("converged after {} steps", self.model.step_count());
        }

        let frames: &[Snapshot] = &self.model.metrics().snapshots()[self.persisted..];

        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write_named(&mut writer, frames).context("failed to serialize snapshots")?;
        writer.flush().context("failed to flush writer stream")?;

        self.persisted = self.model.metrics().snapshots().len();

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}
