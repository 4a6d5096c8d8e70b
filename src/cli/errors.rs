//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero status.

use std::fmt;
use std::io;

use crate::errors::QueryError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// Malformed command-line input (pipeline or data JSON)
    InputError,
    /// The query engine rejected or failed the request
    QueryFailed,
    /// Async runtime could not be created
    RuntimeFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AEROQUERY_CLI_CONFIG_ERROR",
            Self::IoError => "AEROQUERY_CLI_IO_ERROR",
            Self::InputError => "AEROQUERY_CLI_INPUT_ERROR",
            Self::QueryFailed => "AEROQUERY_CLI_QUERY_FAILED",
            Self::RuntimeFailed => "AEROQUERY_CLI_RUNTIME_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Input error
    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    /// Runtime creation failed
    pub fn runtime_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RuntimeFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<QueryError> for CliError {
    fn from(e: QueryError) -> Self {
        let code = match e {
            QueryError::Config(_) => CliErrorCode::ConfigError,
            _ => CliErrorCode::QueryFailed,
        };
        Self::new(code, format!("[{}] {}: {}", e.severity(), e.code(), e))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
