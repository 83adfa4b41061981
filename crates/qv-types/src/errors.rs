use thiserror::Error;

/// Main error type for the Quiver system
#[derive(Error, Debug)]
pub enum QvError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Parameter error: {0}")]
    Parameter(#[from] ParameterError),

    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while building an optimizer or an engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Objective has no free parameters")]
    NoFreeParameters,

    #[error("Evaluation engine needs at least one thread")]
    ZeroThreads,

    #[error("Stop condition '{condition}' requires fitness history, but history capacity is 0")]
    HistoryRequired { condition: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of a single candidate evaluation.
///
/// These never abort a batch; the optimizer records the candidate with the
/// worst possible fitness and carries on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Objective evaluation failed: {message}")]
    Failed { message: String },

    #[error("Objective evaluation panicked: {message}")]
    Panicked { message: String },

    #[error("Evaluation task was dropped before producing a result")]
    Abandoned,

    #[error("Search point has {actual} values, objective expects {expected}")]
    InvalidDimension { expected: usize, actual: usize },
}

impl EvaluationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}

/// Failure of the dispatch machinery itself (not of an individual candidate)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error("Could not spawn evaluation thread: {message}")]
    Spawn { message: String },

    #[error("Worker pool is stopped")]
    PoolStopped,
}

/// Parameter specification errors; always name the offending parameter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParameterError {
    #[error("Error parsing parameter '{name}': no parameter defined")]
    NothingDefined { name: String },

    #[error("Error parsing parameter '{name}': mean already defined")]
    MeanAlreadyDefined { name: String },

    #[error("Error parsing parameter '{name}': standard deviation already set")]
    StdAlreadyDefined { name: String },

    #[error("Error parsing parameter '{name}': min / max without std")]
    BoundsWithoutStd { name: String },

    #[error("Error parsing parameter '{name}': min > max")]
    MinGreaterThanMax { name: String },

    #[error("Error parsing parameter '{name}': opening bracket {open} does not match closing bracket {close}")]
    BracketMismatch { name: String, open: char, close: String },

    #[error("Error parsing parameter '{name}': expected ','")]
    ExpectedComma { name: String },

    #[error("Error parsing parameter '{name}': invalid number '{token}'")]
    InvalidNumber { name: String, token: String },

    #[error("Error parsing parameter '{name}': could not find {reference}")]
    UnknownReference { name: String, reference: String },

    #[error("Parameter '{name}' is already defined")]
    Duplicate { name: String },
}

impl ParameterError {
    /// Name of the parameter that failed to parse.
    pub fn name(&self) -> &str {
        match self {
            Self::NothingDefined { name }
            | Self::MeanAlreadyDefined { name }
            | Self::StdAlreadyDefined { name }
            | Self::BoundsWithoutStd { name }
            | Self::MinGreaterThanMax { name }
            | Self::BracketMismatch { name, .. }
            | Self::ExpectedComma { name }
            | Self::InvalidNumber { name, .. }
            | Self::UnknownReference { name, .. }
            | Self::Duplicate { name } => name,
        }
    }
}

/// Calling an operation the optimizer was not configured for
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("Fitness tracking must be enabled for this method")]
    HistoryDisabled,
}

/// Result type alias for Quiver operations
pub type QvResult<T> = Result<T, QvError>;

/// Outcome of evaluating one candidate.
pub type EvalOutcome = Result<f64, EvaluationError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::QvError::Config($crate::ConfigError::InvalidConfig(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = ParameterError::BracketMismatch {
            name: "hip.gain".to_string(),
            open: '[',
            close: ")".to_string(),
        };

        let message = error.to_string();
        assert!(message.contains("hip.gain"));
        assert!(message.contains("opening bracket [ does not match closing bracket )"));
        assert_eq!(error.name(), "hip.gain");
    }

    #[test]
    fn test_error_conversion() {
        let qv_error: QvError = ConfigError::NoFreeParameters.into();

        match qv_error {
            QvError::Config(ConfigError::NoFreeParameters) => (),
            _ => panic!("Expected Config error"),
        }
    }

    #[test]
    fn test_config_macro() {
        let err = config_error!("Missing required field: {}", "max_threads");
        assert!(err.to_string().contains("max_threads"));
    }
}
