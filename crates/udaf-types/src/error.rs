use thiserror::Error;

#[derive(Error, Debug)]
pub enum UdafError {
    #[error("Argument count error: expected {expected}, got {actual}")]
    ArgumentCount { expected: String, actual: usize },

    #[error("Argument type error at position {position}: {message}")]
    ArgumentType { position: usize, message: String },

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("Invalid partial representation: {0}")]
    InvalidPartialRepresentation(String),

    #[error("Empty input: {0}")]
    EmptyInput(String),

    #[error("Evaluator used before initialize: {0}")]
    Uninitialized(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),
}

impl UdafError {
    pub fn argument_type(position: usize, message: impl Into<String>) -> Self {
        UdafError::ArgumentType {
            position,
            message: message.into(),
        }
    }

    pub fn argument_count(expected: impl Into<String>, actual: usize) -> Self {
        UdafError::ArgumentCount {
            expected: expected.into(),
            actual,
        }
    }
}

pub type Result<T> = std::result::Result<T, UdafError>;
