//! # qv-params
//!
//! Parameter specification mini-language and named free-parameter registry.
//!
//! A specification is either a bare value (`"1.5"`, fixed), `mean~std`,
//! `mean~std[min,max]` (also `<min,max>` or `(min,max)`), or `~value`.
//! Structured JSON objects with `mean` / `std` / `min` / `max` / `is_free`
//! keys are accepted as well.

mod set;
mod spec;

pub use set::{ParInfo, ParameterSet};
pub use spec::{
    default_std, FreePar, ParValue, DEFAULT_LOWER_BOUND, DEFAULT_STD_FACTOR, DEFAULT_STD_MINIMUM,
    DEFAULT_UPPER_BOUND,
};
