use thiserror::Error;

#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {0}")]
    Query(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("connection error: {0}")]
    Connection(String),

    /// A UNIQUE / FOREIGN KEY / CHECK constraint rejected the statement.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// A transaction body gave up; everything it wrote was rolled back.
    #[error("transaction aborted: {0}")]
    Aborted(String),
}

impl SQLError {
    pub fn is_constraint(&self) -> bool {
        matches!(self, SQLError::Constraint(_))
    }
}
