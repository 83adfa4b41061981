//! The seam where a concrete search algorithm plugs into the control loop.

use qv_types::{Fitness, Population};

use crate::state::OptimizerState;

/// Produces each step's population and learns from its results.
pub trait SearchStrategy: Send {
    /// Generate the next population to evaluate.
    fn suggest(&mut self, state: &OptimizerState) -> Population;

    /// Results of the population returned by the last `suggest`, index-aligned.
    fn report(&mut self, _population: &Population, _results: &[Fitness]) {}

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}
