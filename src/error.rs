use std::io;

use thiserror::Error;

/// The source could not be read as Python.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error on line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A statement has no structogram representation. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("line {line}: unsupported construct: {construct}")]
    UnsupportedConstruct { line: usize, construct: String },

    #[error("line {line}: unsupported loop shape: {reason}")]
    UnsupportedLoopShape { line: usize, reason: String },

    #[error("line {line}: unsupported match pattern: {reason}")]
    UnsupportedMatchPattern { line: usize, reason: String },
}

impl BuildError {
    pub fn line(&self) -> usize {
        match self {
            Self::UnsupportedConstruct { line, .. }
            | Self::UnsupportedLoopShape { line, .. }
            | Self::UnsupportedMatchPattern { line, .. } => *line,
        }
    }
}

/// Failure while running the function for its trace.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("line {line}: {kind}: {message}")]
    Runtime {
        line: usize,
        kind: &'static str,
        message: String,
    },

    #[error("step limit of {limit} statements exceeded")]
    StepLimit { limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// The dry run stopped early. Only the trace annotation is affected.
#[derive(Debug, Error)]
#[error("traced execution did not complete: {source}")]
pub struct TracedExecutionFailed {
    #[source]
    pub source: ExecutionError,
}

/// The main error type for structogram generation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("no function named `{0}` found")]
    FunctionNotFound(String),

    #[error("no function definition found")]
    NoFunction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn build_error_names_line() {
        let err = BuildError::UnsupportedConstruct {
            line: 7,
            construct: "for loop".to_string(),
        };
        assert_eq!(err.line(), 7);
        assert_eq!(err.to_string(), "line 7: unsupported construct: for loop");
    }

    #[test]
    fn build_error_converts_transparently() {
        let err: Error = BuildError::UnsupportedLoopShape {
            line: 3,
            reason: "no trailing `if not ...: break`".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "line 3: unsupported loop shape: no trailing `if not ...: break`"
        );
    }

    #[test]
    fn runtime_error_display() {
        let err = ExecutionError::Runtime {
            line: 4,
            kind: "ZeroDivisionError",
            message: "division by zero".to_string(),
        };
        assert_eq!(err.to_string(), "line 4: ZeroDivisionError: division by zero");
    }

    #[test]
    fn traced_failure_keeps_its_cause() {
        let err = TracedExecutionFailed {
            source: ExecutionError::StepLimit { limit: 10 },
        };
        assert_eq!(
            err.to_string(),
            "traced execution did not complete: step limit of 10 statements exceeded"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
