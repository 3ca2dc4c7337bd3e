//! Configuration for the metadata helper.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MetadataError, Result};

/// Directory under the content root that holds cached result sets.
pub const RESULT_SETS_DIR: &str = "ResultSets";

/// Metadata helper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Application content root; cache files go to `<root>/ResultSets`
    #[serde(default)]
    pub content_root: Option<PathBuf>,

    /// Persist live result sets and fall back to them when introspection fails
    #[serde(default)]
    pub persist_result_sets: bool,

    /// Treat a successful zero-column description like a failure and try the cache
    #[serde(default = "default_true")]
    pub treat_empty_as_failure: bool,

    /// Keep loaded and saved result sets in memory for the life of the helper
    #[serde(default = "default_true")]
    pub memoize: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            content_root: None,
            persist_result_sets: false,
            treat_empty_as_failure: default_true(),
            memoize: default_true(),
        }
    }
}

impl MetadataConfig {
    /// Configuration with result-set caching under `content_root`.
    pub fn with_cache(content_root: impl Into<PathBuf>) -> Self {
        Self {
            content_root: Some(content_root.into()),
            persist_result_sets: true,
            ..Self::default()
        }
    }

    /// Reject configurations the helper cannot honour.
    pub fn validate(&self) -> Result<()> {
        match &self.content_root {
            None if self.persist_result_sets => Err(MetadataError::config(
                "persist_result_sets is enabled but no content_root is configured",
            )),
            Some(root) if root.as_os_str().is_empty() => {
                Err(MetadataError::config("content_root is empty"))
            }
            Some(root) if root.exists() && !root.is_dir() => Err(MetadataError::config(format!(
                "content_root is not a directory: {}",
                root.display()
            ))),
            _ => Ok(()),
        }
    }

    /// Cache directory, when a content root is configured.
    pub fn result_sets_dir(&self) -> Option<PathBuf> {
        self.content_root
            .as_deref()
            .map(|root: &Path| root.join(RESULT_SETS_DIR))
    }
}
