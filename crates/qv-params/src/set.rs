//! Named free parameters, built up while an objective reads its configuration.

use qv_types::{EvaluationError, ParameterError, SearchPoint};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::spec::{FreePar, ParValue};

/// A registered free parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParInfo {
    /// Fully qualified name (prefixes included).
    pub name: String,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// Ordered registry of free parameters plus the values currently bound to
/// them.
///
/// Values start at each parameter's mean; [`ParameterSet::bind`] replaces
/// them with a candidate's search point so that repeated `get` calls return
/// the candidate's values.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<ParInfo>,
    values: Vec<f64>,
    index: HashMap<String, usize>,
    prefixes: Vec<String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current name prefix (the concatenation of all pushed prefixes).
    pub fn prefix(&self) -> String {
        self.prefixes.concat()
    }

    pub fn push_prefix(&mut self, prefix: impl Into<String>) {
        self.prefixes.push(prefix.into());
    }

    pub fn pop_prefix(&mut self) -> Option<String> {
        self.prefixes.pop()
    }

    /// Value of a fully qualified parameter name.
    pub fn try_get(&self, full_name: &str) -> Option<f64> {
        self.index.get(full_name).map(|&i| self.values[i])
    }

    /// Value of `name` under the current prefix. An existing parameter wins;
    /// otherwise `spec` is resolved (`@other` references another parameter)
    /// and, when free, registered.
    pub fn get(&mut self, name: &str, spec: &str) -> Result<f64, ParameterError> {
        let full_name = self.prefix() + name;
        if let Some(v) = self.try_get(&full_name) {
            return Ok(v);
        }
        if let Some(reference) = spec.strip_prefix('@') {
            return self
                .try_get(reference)
                .ok_or_else(|| ParameterError::UnknownReference {
                    name: full_name,
                    reference: spec.to_string(),
                });
        }

        let value = ParValue::parse(&full_name, spec)?;
        self.register(full_name, value)
    }

    /// Same as [`ParameterSet::get`] for a JSON-configured parameter.
    pub fn get_json(&mut self, name: &str, spec: &Value) -> Result<f64, ParameterError> {
        if let Value::String(s) = spec {
            return self.get(name, s);
        }
        let full_name = self.prefix() + name;
        if let Some(v) = self.try_get(&full_name) {
            return Ok(v);
        }
        let value = ParValue::from_json(&full_name, spec)?;
        self.register(full_name, value)
    }

    /// Register a free parameter with explicit settings; returns its mean.
    pub fn add(
        &mut self,
        name: &str,
        mean: f64,
        std: f64,
        min: f64,
        max: f64,
    ) -> Result<f64, ParameterError> {
        let full_name = self.prefix() + name;
        self.register(
            full_name,
            ParValue::Free(FreePar {
                mean,
                std,
                min,
                max,
            }),
        )
    }

    fn register(&mut self, full_name: String, value: ParValue) -> Result<f64, ParameterError> {
        let par = match value {
            ParValue::Fixed(v) => return Ok(v),
            ParValue::Free(par) => par,
        };
        if let Some(bad) = [par.mean, par.std, par.min, par.max].into_iter().find(|v| v.is_nan()) {
            return Err(ParameterError::InvalidNumber {
                name: full_name,
                token: bad.to_string(),
            });
        }
        if par.min > par.max {
            return Err(ParameterError::MinGreaterThanMax { name: full_name });
        }
        if self.index.contains_key(&full_name) {
            return Err(ParameterError::Duplicate { name: full_name });
        }

        tracing::debug!(
            name = %full_name,
            mean = par.mean,
            std = par.std,
            min = par.min,
            max = par.max,
            "registered free parameter"
        );
        self.index.insert(full_name.clone(), self.params.len());
        self.values.push(par.mean);
        self.params.push(ParInfo {
            name: full_name,
            mean: par.mean,
            std: par.std,
            min: par.min,
            max: par.max,
        });
        Ok(par.mean)
    }

    /// Number of free parameters.
    pub fn dim(&self) -> usize {
        self.params.len()
    }

    pub fn infos(&self) -> &[ParInfo] {
        &self.params
    }

    /// Initial search point (all means).
    pub fn means(&self) -> SearchPoint {
        SearchPoint::new(self.params.iter().map(|p| p.mean).collect())
    }

    pub fn std_devs(&self) -> Vec<f64> {
        self.params.iter().map(|p| p.std).collect()
    }

    /// Bind a candidate's values; subsequent lookups return them.
    pub fn bind(&mut self, point: &SearchPoint) -> Result<(), EvaluationError> {
        if point.len() != self.params.len() {
            return Err(EvaluationError::InvalidDimension {
                expected: self.params.len(),
                actual: point.len(),
            });
        }
        self.values.copy_from_slice(point.values());
        Ok(())
    }

    /// Clamp a point into every parameter's bounds.
    pub fn clamp(&self, point: &mut SearchPoint) {
        let clamped: Vec<f64> = point
            .values()
            .iter()
            .zip(&self.params)
            .map(|(v, p)| v.clamp(p.min, p.max))
            .collect();
        point.set_values(&clamped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fixed_values_are_not_registered() {
        let mut set = ParameterSet::new();
        assert_eq!(set.get("gain", "1.5"), Ok(1.5));
        assert_eq!(set.dim(), 0);
    }

    #[test]
    fn free_parameters_register_in_order() {
        let mut set = ParameterSet::new();
        assert_eq!(set.get("a", "0~0.2[0,1]"), Ok(0.0));
        assert_eq!(set.get("b", "~0.5"), Ok(0.5));
        assert_eq!(set.dim(), 2);
        assert_eq!(set.infos()[0].name, "a");
        assert_eq!(set.means().values(), &[0.0, 0.5]);
        assert_eq!(set.std_devs()[0], 0.2);
    }

    #[test]
    fn existing_parameter_wins_over_new_spec() {
        let mut set = ParameterSet::new();
        set.get("a", "1~0.1").unwrap();
        assert_eq!(set.get("a", "7~3"), Ok(1.0));
        assert_eq!(set.dim(), 1);
    }

    #[test]
    fn prefixes_qualify_names() {
        let mut set = ParameterSet::new();
        set.push_prefix("leg.");
        set.push_prefix("knee.");
        set.get("stiffness", "10~1").unwrap();
        assert_eq!(set.pop_prefix().as_deref(), Some("knee."));
        set.get("stiffness", "5~1").unwrap();

        assert_eq!(set.try_get("leg.knee.stiffness"), Some(10.0));
        assert_eq!(set.try_get("leg.stiffness"), Some(5.0));
    }

    #[test]
    fn references_resolve_full_names() {
        let mut set = ParameterSet::new();
        set.push_prefix("left.");
        set.get("gain", "2~0.5").unwrap();
        set.pop_prefix();

        set.push_prefix("right.");
        assert_eq!(set.get("gain", "@left.gain"), Ok(2.0));
        assert_eq!(set.dim(), 1);
        assert!(matches!(
            set.get("offset", "@left.offset"),
            Err(ParameterError::UnknownReference { .. })
        ));
    }

    #[test]
    fn bind_replaces_values() {
        let mut set = ParameterSet::new();
        set.get("a", "0~1").unwrap();
        set.get("b", "0~1").unwrap();
        set.bind(&SearchPoint::from(vec![0.3, -0.7])).unwrap();
        assert_eq!(set.get("a", "0~1"), Ok(0.3));
        assert_eq!(set.try_get("b"), Some(-0.7));

        assert!(set.bind(&SearchPoint::zeros(3)).is_err());
    }

    #[test]
    fn json_specs() {
        let mut set = ParameterSet::new();
        assert_eq!(set.get_json("a", &json!({ "mean": 2.0, "std": 0.5 })), Ok(2.0));
        assert_eq!(set.get_json("b", &json!("1~0.1[0,2]")), Ok(1.0));
        assert_eq!(set.get_json("c", &json!(9.0)), Ok(9.0));
        assert_eq!(set.dim(), 2);
    }

    #[test]
    fn explicit_add_rejects_duplicates_and_bad_bounds() {
        let mut set = ParameterSet::new();
        assert_eq!(set.add("x", 0.5, 0.1, 0.0, 1.0), Ok(0.5));
        assert!(matches!(
            set.add("x", 0.5, 0.1, 0.0, 1.0),
            Err(ParameterError::Duplicate { .. })
        ));
        assert!(matches!(
            set.add("y", 0.5, 0.1, 2.0, 1.0),
            Err(ParameterError::MinGreaterThanMax { .. })
        ));
    }

    #[test]
    fn nan_settings_are_rejected() {
        let mut set = ParameterSet::new();
        assert!(matches!(
            set.add("x", 0.5, 0.1, f64::NAN, 1.0),
            Err(ParameterError::InvalidNumber { .. })
        ));
        assert!(matches!(
            set.add("y", f64::NAN, 0.1, 0.0, 1.0),
            Err(ParameterError::InvalidNumber { .. })
        ));
        assert!(matches!(
            set.get("z", "0~1[nan,1]"),
            Err(ParameterError::InvalidNumber { .. })
        ));
        assert_eq!(set.dim(), 0);

        // infinite bounds still clamp
        set.add("w", 0.0, 1.0, f64::NEG_INFINITY, 1.0).unwrap();
        let mut point = SearchPoint::from(vec![5.0]);
        set.clamp(&mut point);
        assert_eq!(point.values(), &[1.0]);
    }

    #[test]
    fn clamp_respects_bounds() {
        let mut set = ParameterSet::new();
        set.get("a", "0~0.2[0,1]").unwrap();
        set.get("b", "0~0.2<-1,1>").unwrap();
        let mut point = SearchPoint::from(vec![2.0, -3.0]);
        set.clamp(&mut point);
        assert_eq!(point.values(), &[1.0, -1.0]);
    }
}
