//! Configuration resolution for the CLI
//!
//! Priority, highest first:
//! 1. Command-line flags (and their SQLSHAPE_* environment variables)
//! 2. The config file (`--config`, or `./sqlshape.toml` when present)
//! 3. Defaults

use serde::{Deserialize, Serialize};
use sqlshape_db::MetadataConfig;
use std::path::{Path, PathBuf};

use super::error::HelpfulError;

/// Config file looked up in the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "sqlshape.toml";

/// Contents of `sqlshape.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    /// ADO.NET connection string
    #[serde(default)]
    pub connection: Option<String>,

    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl FileConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, HelpfulError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HelpfulError::bad_config_file(path, &e.to_string()))?;
        toml::from_str(&content).map_err(|e| HelpfulError::bad_config_file(path, &e.to_string()))
    }
}

/// Global flags that feed configuration
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub connection: Option<String>,
    pub content_root: Option<PathBuf>,
}

/// Fully resolved settings
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Config file that was read, if any
    pub config_file: Option<PathBuf>,
    #[serde(skip_serializing)]
    pub connection: Option<String>,
    pub metadata: MetadataConfig,
}

impl Settings {
    pub fn resolve(overrides: Overrides) -> Result<Self, HelpfulError> {
        let config_file = match overrides.config_path {
            Some(path) => Some(path),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };
        let file = match &config_file {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };

        let mut metadata = file.metadata;
        if let Some(root) = overrides.content_root {
            metadata.content_root = Some(root);
            metadata.persist_result_sets = true;
        }

        Ok(Self {
            config_file,
            connection: overrides.connection.or(file.connection),
            metadata,
        })
    }

    pub fn require_connection(&self) -> Result<&str, HelpfulError> {
        self.connection
            .as_deref()
            .ok_or_else(HelpfulError::missing_connection)
    }

    pub fn require_result_sets_dir(&self) -> Result<PathBuf, HelpfulError> {
        self.metadata
            .result_sets_dir()
            .ok_or_else(HelpfulError::missing_content_root)
    }
}

/// Arguments for the config command
#[derive(Debug, clap::Args)]
pub struct ConfigArgs {
    /// Show resolved settings in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Run the config command - shows resolved settings
pub fn run(args: ConfigArgs, settings: &Settings) -> anyhow::Result<()> {
    if args.json {
        return super::output::print_json(settings);
    }

    let show_path = |p: Option<&Path>| {
        p.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    };
    let rows = vec![
        vec!["config file".to_string(), show_path(settings.config_file.as_deref())],
        vec![
            "connection".to_string(),
            if settings.connection.is_some() { "(set)" } else { "(none)" }.to_string(),
        ],
        vec![
            "content root".to_string(),
            show_path(settings.metadata.content_root.as_deref()),
        ],
        vec![
            "result sets dir".to_string(),
            show_path(settings.metadata.result_sets_dir().as_deref()),
        ],
        vec![
            "persist result sets".to_string(),
            settings.metadata.persist_result_sets.to_string(),
        ],
        vec![
            "empty counts as failure".to_string(),
            settings.metadata.treat_empty_as_failure.to_string(),
        ],
        vec!["memoize".to_string(), settings.metadata.memoize.to_string()],
    ];
    println!("{}", super::output::build_table(&["SETTING", "VALUE"], rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_values_and_flag_overrides() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sqlshape.toml");
        std::fs::write(
            &path,
            r#"
connection = "server=tcp:db,1433;user=app"

[metadata]
content_root = "/srv/app"
persist_result_sets = false
treat_empty_as_failure = false
"#,
        )
        .unwrap();

        let settings = Settings::resolve(Overrides {
            config_path: Some(path.clone()),
            connection: None,
            content_root: Some(tmp.path().to_path_buf()),
        })
        .unwrap();

        assert_eq!(settings.config_file, Some(path));
        assert_eq!(settings.require_connection().unwrap(), "server=tcp:db,1433;user=app");
        assert_eq!(settings.metadata.content_root.as_deref(), Some(tmp.path()));
        assert!(settings.metadata.persist_result_sets);
        assert!(!settings.metadata.treat_empty_as_failure);
    }

    #[test]
    fn test_missing_connection_is_helpful() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.toml");
        std::fs::write(&path, "").unwrap();

        let settings = Settings::resolve(Overrides {
            config_path: Some(path),
            ..Overrides::default()
        })
        .unwrap();

        let err = settings.require_connection().unwrap_err();
        assert!(err.to_string().contains("SQLSHAPE_CONNECTION"));
        assert!(settings.require_result_sets_dir().is_err());
    }

    #[test]
    fn test_bad_config_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.toml");
        std::fs::write(&path, "connection = ").unwrap();

        let err = Settings::resolve(Overrides {
            config_path: Some(path),
            ..Overrides::default()
        })
        .unwrap_err();

        assert!(err.message.contains("broken.toml"));
    }
}
