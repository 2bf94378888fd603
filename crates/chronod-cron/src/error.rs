use thiserror::Error;

/// Errors from schedule expression parsing.
#[derive(Debug, Error)]
pub enum CronError {
    /// The expression does not conform to the schedule grammar.
    #[error("invalid schedule expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },
}

impl CronError {
    pub(crate) fn invalid(expr: &str, reason: impl Into<String>) -> Self {
        CronError::InvalidExpression {
            expr: expr.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CronError>;
