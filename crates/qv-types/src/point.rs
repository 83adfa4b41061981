//! Search points and populations.

use serde::{Deserialize, Serialize};

/// An ordered vector of real-valued parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPoint {
    values: Vec<f64>,
}

/// One step's batch of candidates.
pub type Population = Vec<SearchPoint>;

impl SearchPoint {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// A point of `dim` zeros.
    pub fn zeros(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Overwrite the values in place, keeping the allocation.
    pub fn set_values(&mut self, values: &[f64]) {
        self.values.clear();
        self.values.extend_from_slice(values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Euclidean distance; only the overlapping dimensions are compared.
    pub fn distance_to(&self, other: &[f64]) -> f64 {
        self.values
            .iter()
            .zip(other)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f64>()
            .sqrt()
    }
}

impl From<Vec<f64>> for SearchPoint {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl std::fmt::Display for SearchPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}
