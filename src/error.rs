use crate::parser;

/// Error type for JSONPath query string parsing errors
#[derive(Debug, Clone, thiserror::Error)]
#[error("{err}")]
pub struct ParseError {
    err: Box<ErrorImpl>,
}

impl ParseError {
    /// Get the 1-indexed error position
    pub fn position(&self) -> usize {
        self.err.position
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.err.message
    }

    pub(crate) fn new(message: impl Into<Box<str>>, position: usize) -> Self {
        Self {
            err: Box::new(ErrorImpl {
                position,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("at position {position}, {message}")]
struct ErrorImpl {
    position: usize,
    message: Box<str>,
}

impl<'a> From<(&'a str, parser::Error<'a>)> for ParseError {
    fn from((input, pe): (&'a str, parser::Error<'a>)) -> Self {
        #[cfg(feature = "trace")]
        tracing::trace!(input, parser_error = ?pe);
        Self::new(pe.describe(), pe.calculate_position(input))
    }
}

/// Error type for failures while evaluating a compiled JSONPath query
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// A filter or script segment was reached while expression evaluation
    /// is disabled, either by the eval policy or by `prevent_eval`
    #[error("expression evaluation is disabled")]
    EvalDisabled,
    /// The safe-eval identifier scan rejected a name in a filter or script
    /// expression
    #[error("unsafe identifier '{0}' in expression")]
    UnsafeIdentifier(String),
    /// An expression failed while being evaluated against a candidate node
    #[error("expression evaluation failed: {0}")]
    FilterRuntime(String),
    /// A lazily parsed filter or script body turned out to be invalid
    #[error("invalid expression: {0}")]
    FilterParse(#[from] ParseError),
}

impl EvalError {
    pub(crate) fn runtime(message: impl Into<String>) -> Self {
        Self::FilterRuntime(message.into())
    }
}

/// Error type produced by the fused [`query`][crate::query] entry point
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query string did not parse
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The query failed during evaluation
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod tests {
    use super::{EvalError, ParseError, QueryError};

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<ParseError>();
        assert_send::<EvalError>();
        assert_send::<QueryError>();
    }

    #[test]
    fn test_sync() {
        fn assert_sync<T: Sync>() {}
        assert_sync::<ParseError>();
        assert_sync::<EvalError>();
        assert_sync::<QueryError>();
    }
}
