//! Error types shared by every clicod module.

use std::path::PathBuf;
use thiserror::Error;

/// clicod error types
#[derive(Error, Debug)]
pub enum ClicodError {
    #[error("Config file {path} is corrupted ({source}). Fix it by hand or run 'clicod config --reset'")]
    ConfigCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot write config file {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown option '{name}'. Valid options: {valid}")]
    UnknownOption { name: String, valid: String },

    #[error("Invalid value '{value}' for '{option}': expected {expected}")]
    InvalidValue {
        option: String,
        value: String,
        expected: String,
    },

    #[error("Gemini API call failed: {0}")]
    RemoteCall(String),

    #[error("No Gemini API key configured. Run 'clicod config --set-key' or export GEMINI_API_KEY")]
    MissingApiKey,

    #[error("No response generated from Gemini")]
    EmptyResponse,

    #[error("Failed to parse JSON response from model: {reason}\nResponse preview: {preview}")]
    MalformedResponse { reason: String, preview: String },

    #[error("Cannot save {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find home directory")]
    NoHomeDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for clicod operations
pub type Result<T> = std::result::Result<T, ClicodError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_option_lists_valid_names() {
        let err = ClicodError::UnknownOption {
            name: "colour".to_string(),
            valid: "auto_save, streaming".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unknown option 'colour'. Valid options: auto_save, streaming"
        );
    }

    #[test]
    fn test_invalid_value_names_expected_kind() {
        let err = ClicodError::InvalidValue {
            option: "auto_save".to_string(),
            value: "maybe".to_string(),
            expected: "a boolean".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'maybe' for 'auto_save': expected a boolean"
        );
    }

    #[test]
    fn test_remote_call_carries_vendor_message() {
        let err = ClicodError::RemoteCall("API key not valid".to_string());
        assert_eq!(err.to_string(), "Gemini API call failed: API key not valid");
    }

    #[test]
    fn test_corrupt_config_points_to_reset() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ClicodError::ConfigCorrupt {
            path: PathBuf::from("/home/u/.clicod/config.json"),
            source,
        };
        assert!(err.to_string().contains("/home/u/.clicod/config.json"));
        assert!(err.to_string().contains("clicod config --reset"));
    }
}
