//! Unified application error model.
//! Every stage of the association pipeline reports failures through `AppError`;
//! storage helpers return `anyhow::Result` and are mapped at the engine boundary.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    /// Source relation missing or empty, or a name collides with a reserved field.
    Schema { code: String, message: String },
    /// Too few usable target columns, or a malformed column list / identifier.
    Validation { code: String, message: String },
    /// Destination relation already exists.
    OutputCollision { code: String, message: String },
    /// The relation engine failed while running a stage.
    Exec { code: String, message: String },
    Io { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Schema { code, .. }
            | AppError::Validation { code, .. }
            | AppError::OutputCollision { code, .. }
            | AppError::Exec { code, .. }
            | AppError::Io { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Schema { message, .. }
            | AppError::Validation { message, .. }
            | AppError::OutputCollision { message, .. }
            | AppError::Exec { message, .. }
            | AppError::Io { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn schema<S: Into<String>>(code: S, msg: S) -> Self { AppError::Schema { code: code.into(), message: msg.into() } }
    pub fn validation<S: Into<String>>(code: S, msg: S) -> Self { AppError::Validation { code: code.into(), message: msg.into() } }
    pub fn collision<S: Into<String>>(code: S, msg: S) -> Self { AppError::OutputCollision { code: code.into(), message: msg.into() } }
    pub fn exec<S: Into<String>>(code: S, msg: S) -> Self { AppError::Exec { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// SQLSTATE-style class for callers that surface errors through a relational front end.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            AppError::Schema { .. } => "42P01",          // undefined_table / undefined_column family
            AppError::Validation { .. } => "22023",      // invalid_parameter_value
            AppError::OutputCollision { .. } => "42P07", // duplicate_table
            AppError::Exec { .. } => "XX000",
            AppError::Io { .. } => "58030",              // io_error
            AppError::Internal { .. } => "XX000",
        }
    }

    pub fn is_validation(&self) -> bool { matches!(self, AppError::Validation { .. }) }
    pub fn is_schema(&self) -> bool { matches!(self, AppError::Schema { .. }) }
    pub fn is_collision(&self) -> bool { matches!(self, AppError::OutputCollision { .. }) }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as Exec unless the chain already carries an AppError
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => AppError::Exec { code: "exec_error".into(), message: err.to_string() },
        }
    }
}

impl From<polars::prelude::PolarsError> for AppError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        AppError::Exec { code: "polars_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io { code: "io_error".into(), message: err.to_string() }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Io { code: "json_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod error_tests;
