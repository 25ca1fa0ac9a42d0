//! Helpful error types for CLI commands
//!
//! Every error carries what went wrong, some context, and suggestions for
//! fixing it.

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Record file does not exist
    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The record file to check does not exist")
            .with_suggestion(format!("TRY: ls -la {}", path.display()))
    }

    /// Batch folder does not exist or is not a folder
    pub fn not_a_directory(path: &Path) -> Self {
        Self::new(format!("Not a directory: {}", path.display()))
            .with_context("batch renders the record files inside a folder")
            .with_suggestion("TRY: Pass a folder with --dir, or omit it to use the watch root")
    }

    /// A record was rejected by `check`
    pub fn record_rejected(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(format!("Record rejected: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestion("TRY: Fix the record and drop it into the watch root again")
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let err = HelpfulError::record_rejected(Path::new("entrada/a.json"), "missing required field: fecha");
        let text = err.to_string();
        assert!(text.starts_with("ERROR: Record rejected: entrada/a.json"));
        assert!(text.contains("CONTEXT: missing required field: fecha"));
        assert!(text.contains("  TRY:"));
    }
}
