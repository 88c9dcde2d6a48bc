//! Error types and handling for the `FlyTicker` pipeline

use thiserror::Error;

/// Main error type for the `FlyTicker` library
#[derive(Error, Debug)]
pub enum FlyTickerError {
    /// Configuration-related errors (fatal at startup)
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// No forecast samples left after applying the flight window
    #[error("Insufficient forecast data for '{location}': {message}")]
    InsufficientData { location: String, message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON (de)serialization errors
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl FlyTickerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new insufficient data error for a location
    pub fn insufficient_data<L: Into<String>, S: Into<String>>(location: L, message: S) -> Self {
        Self::InsufficientData {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Configuration errors abort the run before any location is processed
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, FlyTickerError::Config { .. })
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            FlyTickerError::Config { .. } => {
                "Configuration error. Please check your config file, limits and prompt templates."
                    .to_string()
            }
            FlyTickerError::Validation { message } => {
                format!("Invalid input: {message}")
            }
            FlyTickerError::InsufficientData { location, .. } => {
                format!("Not enough forecast data within the flight hours for {location}.")
            }
            FlyTickerError::Io { .. } => {
                "File operation failed. Please check file paths and permissions.".to_string()
            }
            FlyTickerError::Serialization { .. } => {
                "Input file is not valid JSON for the expected format.".to_string()
            }
        }
    }
}
