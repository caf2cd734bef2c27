use std::fmt;

use crate::value::Value;

/// Error kinds surfaced on the wire inside `["error", kind, message]` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Args field fails to parse as a value tree.
    ArgumentError,
    /// Pipeline resolution failed (unknown export, bad path, cycle).
    PipelineError,
    /// Resolved args could not be prepared for dispatch. Reserved as a
    /// protocol constant; dispatch receives value trees directly.
    SerializationError,
    /// The dispatcher returned an error.
    MethodError,
    /// Pull on an ID with no pending operation and no result.
    ExportNotFound,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::PipelineError => "PipelineError",
            ErrorKind::SerializationError => "SerializationError",
            ErrorKind::MethodError => "MethodError",
            ErrorKind::ExportNotFound => "ExportNotFound",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by method dispatchers and mapped onto reject responses.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        RpcError {
            kind,
            message: message.into(),
        }
    }

    pub fn method_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodError, message)
    }

    pub fn export_not_found() -> Self {
        Self::new(ErrorKind::ExportNotFound, "Export ID not found")
    }

    /// The wire form of this error, suitable for a reject response.
    pub fn to_value(&self) -> Value {
        Value::Error {
            kind: self.kind.as_str().to_string(),
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RpcError {}
