//! Agent-based model of residential segregation with commute costs.
//!
//! Agents on a bounded grid weigh the commute to a fixed city center against
//! the similarity of their neighborhood, and relocate to a random vacant cell
//! whenever their utility falls below an adaptive happiness threshold. The
//! simulation halts once every agent is happy in the same step.

pub mod agent;
pub mod analysis;
pub mod config;
pub mod engine;
pub mod grid;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod scheduler;
pub mod stats;
