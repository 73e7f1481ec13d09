use thiserror::Error;

/// Errors raised by the interpreter itself, as opposed to errors coming from
/// the operating system, which are propagated through `anyhow` untouched.
///
/// Command execution returns `anyhow::Result`, so callers classify a failure
/// with `err.downcast_ref::<ShellError>()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShellError {
    /// A built-in was invoked without an operand it cannot do without.
    #[error("{0}: path required")]
    PathRequired(&'static str),

    /// The same redirection operator appears twice in one command segment.
    #[error("multiple redirection: `{0}` used more than once")]
    MultipleRedirection(&'static str),

    /// An operator without an operand, a malformed `key = value`, an `echo`
    /// without a quoted literal, or arguments a built-in does not accept.
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

impl ShellError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        ShellError::InvalidCommand(reason.into())
    }
}
