use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid description: {0}")]
    InvalidDescription(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid share: {0}% (must be between 0 and 100)")]
    InvalidShare(f64),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("No other user to share expenses with {0}")]
    MissingCounterpart(String),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
