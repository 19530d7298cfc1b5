use std::fmt;

/// Error types for turning a string into a function and evaluating it
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    /// the string is not a valid expression over the allow-listed vocabulary
    Parse {
        input: String,
        /// byte offset of the offending fragment
        position: usize,
        fragment: String,
        cause: String,
    },
    /// the expression is not defined at the requested point
    Domain {
        input: String,
        at: f64,
        cause: String,
    },
}

impl EvaluationError {
    pub fn parse_error(input: &str, position: usize, fragment: &str, cause: impl Into<String>) -> Self {
        EvaluationError::Parse {
            input: input.to_string(),
            position,
            fragment: fragment.to_string(),
            cause: cause.into(),
        }
    }

    pub fn domain_error(input: &str, at: f64, cause: impl Into<String>) -> Self {
        EvaluationError::Domain {
            input: input.to_string(),
            at,
            cause: cause.into(),
        }
    }

    pub fn is_parse_error(&self) -> bool {
        matches!(self, EvaluationError::Parse { .. })
    }

    pub fn is_domain_error(&self) -> bool {
        matches!(self, EvaluationError::Domain { .. })
    }

    /// the raw string the error refers to
    pub fn input(&self) -> &str {
        match self {
            EvaluationError::Parse { input, .. } | EvaluationError::Domain { input, .. } => input,
        }
    }
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvaluationError::Parse {
                input,
                fragment,
                cause,
                ..
            } if fragment.is_empty() => write!(f, "Invalid function '{}': {}", input, cause),
            EvaluationError::Parse {
                input,
                fragment,
                cause,
                ..
            } => write!(f, "Invalid function '{}': {} near '{}'", input, cause, fragment),
            EvaluationError::Domain { input, at, cause } => write!(
                f,
                "Function '{}' is undefined at point {}: {}",
                input, at, cause
            ),
        }
    }
}

impl std::error::Error for EvaluationError {}
