use crate::grid::Position;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub grid: GridConfig,
    pub population: PopulationConfig,
    pub policy: PolicyConfig,
    pub run: RunConfig,
}

/// Grid dimensions and city center placement.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    /// Number of columns.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// City center cell; defaults to the middle of the grid when omitted.
    pub center: Option<(usize, usize)>,
}

impl GridConfig {
    /// Cell reserved for the city center landmark.
    pub fn landmark_position(&self) -> Position {
        match self.center {
            Some((x, y)) => Position { x, y },
            None => Position {
                x: self.width / 2,
                y: self.height / 2,
            },
        }
    }
}

/// Initial population placement parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Probability that a cell is occupied by an agent.
    pub density: f64,
    /// Probability that a placed agent belongs to the minority.
    pub minority_fraction: f64,
}

/// Agent decision policy parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Relative preference for commute over homophily (0: homophily only, 1: commute only).
    pub preference_weight: f64,
    /// Moore neighborhood radius for similarity counts.
    pub radius: usize,
    /// Weight applied to same-type neighbors in the homophily utility.
    pub similar_weight: f64,
    /// Divisor normalizing the homophily utility; computed from `radius` and
    /// `similar_weight` when omitted.
    pub homophily_scale: Option<f64>,
}

/// Run length and reproducibility parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of steps performed per invocation.
    pub max_steps: usize,
    /// RNG seed; omitting it yields a non-reproducible run.
    pub seed: Option<u64>,
}

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Validate all configuration values.
    pub fn validate(&self) -> Result<()> {
        check_num(self.grid.width, 1..10_000).context("invalid grid width")?;
        check_num(self.grid.height, 1..10_000).context("invalid grid height")?;
        if let Some((x, y)) = self.grid.center {
            check_num(x, 0..self.grid.width).context("invalid center x coordinate")?;
            check_num(y, 0..self.grid.height).context("invalid center y coordinate")?;
        }

        check_num(self.population.density, 0.0..=1.0).context("invalid density")?;
        check_num(self.population.minority_fraction, 0.0..=1.0)
            .context("invalid minority fraction")?;

        check_num(self.policy.preference_weight, 0.0..=1.0)
            .context("invalid preference weight")?;
        check_num(self.policy.radius, 1..100).context("invalid neighborhood radius")?;
        if self.policy.similar_weight <= 0.0 {
            bail!(
                "similar weight must be positive, but is {}",
                self.policy.similar_weight
            );
        }
        if let Some(scale) = self.policy.homophily_scale
            && scale <= 0.0
        {
            bail!("homophily scale must be positive, but is {scale}");
        }

        check_num(self.run.max_steps, 1..10_000_000).context("invalid maximum number of steps")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}
