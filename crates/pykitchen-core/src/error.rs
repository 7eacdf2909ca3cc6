//! Error types for the PyKitchen engine.
//!
//! This module defines the error hierarchy for operations that can fail for
//! reasons outside the game itself: loading configuration and catalogs, and
//! commands that reference things which do not exist. Mistakes the *player*
//! makes (wrong types, missing arguments, wrong results) are not errors; they
//! are reported as [`crate::Verdict`]s and event log entries.

use std::path::PathBuf;

/// A specialized `Result` type for PyKitchen operations.
pub type Result<T> = std::result::Result<T, KitchenError>;

/// Errors that can occur while setting up or driving a kitchen session.
///
/// Configuration and catalog variants include actionable suggestions.
#[derive(Debug, thiserror::Error)]
pub enum KitchenError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your pykitchen.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Catalog Errors
    // ========================================================================
    /// Catalog file could not be read or parsed.
    #[error("Invalid catalog '{source_name}': {message}\n\nSuggestion: Check the catalog JSON against catalog/default.json")]
    CatalogParseError {
        /// File path or name of the catalog source.
        source_name: String,
        /// Description of the parse error.
        message: String,
    },

    /// Catalog content is inconsistent.
    #[error("Invalid catalog: {message}\n\nSuggestion: {suggestion}")]
    CatalogValidationError {
        /// Description of the inconsistency.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Command Errors
    // ========================================================================
    /// A command referenced an ingredient id that is not in the catalog.
    #[error("Unknown ingredient: '{id}'")]
    UnknownIngredient {
        /// The requested ingredient id.
        id: String,
    },

    /// A command referenced a tool id that is not in the catalog.
    #[error("Unknown tool: '{id}'")]
    UnknownTool {
        /// The requested tool id.
        id: String,
    },

    /// A slot command targeted an index outside the selected tool's arity.
    #[error("Slot {index} is out of range (the selected tool has {arity} argument slots)")]
    SlotOutOfRange {
        /// The requested slot index (0-based).
        index: usize,
        /// Number of slots of the selected tool.
        arity: usize,
    },

    /// A slot command was issued while no tool is selected.
    #[error("No tool selected")]
    NoToolSelected,
}

impl KitchenError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `CatalogParseError`.
    #[must_use]
    pub fn catalog_parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogParseError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Creates a new `CatalogValidationError` with the given message and suggestion.
    #[must_use]
    pub fn catalog_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::CatalogValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `UnknownIngredient` error.
    #[must_use]
    pub fn unknown_ingredient(id: impl Into<String>) -> Self {
        Self::UnknownIngredient { id: id.into() }
    }

    /// Creates a new `UnknownTool` error.
    #[must_use]
    pub fn unknown_tool(id: impl Into<String>) -> Self {
        Self::UnknownTool { id: id.into() }
    }

    /// Creates a new `SlotOutOfRange` error.
    #[must_use]
    pub const fn slot_out_of_range(index: usize, arity: usize) -> Self {
        Self::SlotOutOfRange { index, arity }
    }

    /// Returns `true` if this error was caused by a malformed command rather
    /// than by broken configuration.
    #[must_use]
    pub const fn is_command_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownIngredient { .. }
                | Self::UnknownTool { .. }
                | Self::SlotOutOfRange { .. }
                | Self::NoToolSelected
        )
    }
}
