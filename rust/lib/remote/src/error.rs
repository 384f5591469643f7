use serde::{Deserialize, Serialize};

/// One entry of an operation's `errors` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    pub message: String,

    /// Stable machine-readable code (`NOT_FOUND`, `ALREADY_EXISTS`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl OperationError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Client-side remote error.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The service answered with an `errors` list.
    #[error("{}", join_messages(.0))]
    Operation(Vec<OperationError>),

    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network: {0}")]
    Network(#[from] reqwest::Error),

    #[error("encode: {0}")]
    Encode(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Build a single-entry operation error.
    pub fn operation(code: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Operation(vec![OperationError::new(code, message)])
    }

    /// Whether any reported operation error carries `code`.
    pub fn has_code(&self, code: &str) -> bool {
        match self {
            RemoteError::Operation(errors) => {
                errors.iter().any(|e| e.code.as_deref() == Some(code))
            }
            _ => false,
        }
    }
}

fn join_messages(errors: &[OperationError]) -> String {
    if errors.is_empty() {
        return "operation failed".to_string();
    }
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_error_display_joins_messages() {
        let err = RemoteError::Operation(vec![
            OperationError::new("NOT_FOUND", "serial SN-1"),
            OperationError::new("INTERNAL", "boom"),
        ]);
        assert_eq!(err.to_string(), "serial SN-1; boom");
        assert_eq!(RemoteError::Operation(vec![]).to_string(), "operation failed");
    }

    #[test]
    fn has_code_matches_any_entry() {
        let err = RemoteError::Operation(vec![
            OperationError { message: "no code".into(), code: None },
            OperationError::new("ALREADY_EXISTS", "dup"),
        ]);
        assert!(err.has_code("ALREADY_EXISTS"));
        assert!(!err.has_code("NOT_FOUND"));
        assert!(!RemoteError::Decode("x".into()).has_code("ALREADY_EXISTS"));
    }
}
