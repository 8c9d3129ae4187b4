use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrontabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read crontab: {0}")]
    Unreadable(String),

    #[error("invalid {field} expression '{expression}': {reason}")]
    Expression {
        field: &'static str,
        expression: String,
        reason: String,
    },

    #[error("line does not contain all expected parts: {0}")]
    MissingParts(String),

    #[error("empty expression")]
    Empty,
}
