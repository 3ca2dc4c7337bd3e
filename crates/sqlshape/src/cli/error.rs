//! Helpful error types for CLI commands
//!
//! Every error says what went wrong, and what to try next.

use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(mut self, suggestions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// No connection string from flags, environment or config file
    pub fn missing_connection() -> Self {
        Self::new("No database connection configured")
            .with_context("This command introspects a live SQL Server database")
            .with_suggestions([
                "TRY: Pass --connection \"server=tcp:localhost,1433;user=sa;password=...\"",
                "TRY: Set SQLSHAPE_CONNECTION in the environment",
                "TRY: Add `connection = \"...\"` to sqlshape.toml",
            ])
    }

    /// A cache command was run without a content root
    pub fn missing_content_root() -> Self {
        Self::new("No content root configured")
            .with_context("Cached result sets live under <content root>/ResultSets")
            .with_suggestions([
                "TRY: Pass --content-root /path/to/app",
                "TRY: Set SQLSHAPE_CONTENT_ROOT in the environment",
                "TRY: Add `content_root = \"...\"` under [metadata] in sqlshape.toml",
            ])
    }

    /// Config file could not be read or parsed
    pub fn bad_config_file(path: &Path, details: &str) -> Self {
        Self::new(format!("Cannot load config file: {}", path.display()))
            .with_context(details.to_string())
            .with_suggestions([
                format!("TRY: Check the file exists: ls -la {}", path.display()),
                "TRY: Validate the TOML syntax".to_string(),
                "TRY: Run `sqlshape config` to see the resolved settings".to_string(),
            ])
    }

    /// Object name could not be parsed
    pub fn invalid_object_name(input: &str, reason: &str) -> Self {
        Self::new(format!("Invalid object name: '{}'", input))
            .with_context(reason.to_string())
            .with_suggestions([
                "TRY: Use schema.name, e.g. dbo.GetUsers",
                "TRY: Quote names containing dots: [dbo].[Get.Users]",
            ])
    }

    /// Nothing in the cache for this object
    pub fn not_cached(object: &str, dir: &Path) -> Self {
        Self::new(format!("No cached result set for {}", object))
            .with_context(format!("Looked in {}", dir.display()))
            .with_suggestions([
                format!("TRY: Describe it once with caching on: sqlshape describe {}", object),
                "TRY: List cached objects: sqlshape cache list".to_string(),
            ])
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
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While describing dbo.GetUsers")
            .with_suggestions(["Try again"]);

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While describing dbo.GetUsers"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_not_cached_mentions_object_and_dir() {
        let err = HelpfulError::not_cached("dbo.GetUsers", &PathBuf::from("/srv/app/ResultSets"));

        let display = format!("{}", err);
        assert!(display.contains("dbo.GetUsers"));
        assert!(display.contains("/srv/app/ResultSets"));
        assert!(display.contains("TRY:"));
    }
}
