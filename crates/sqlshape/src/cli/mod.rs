//! CLI module for sqlshape
//!
//! `describe` and `table-type` talk to a live database; `cache` and
//! `config` only read local files.

pub mod error;
pub mod output;

pub mod cache;
pub mod config;
pub mod describe;
pub mod table_type;

use sqlshape_db::{MetadataError, MssqlSession, ObjectName};

use self::config::Settings;
use self::error::HelpfulError;

/// Parse a command-line object name into a [`HelpfulError`] on failure
pub fn parse_object(input: &str) -> Result<ObjectName, HelpfulError> {
    ObjectName::parse(input).map_err(|err| match err {
        MetadataError::InvalidName { input, reason } => {
            HelpfulError::invalid_object_name(&input, &reason)
        }
        other => HelpfulError::invalid_object_name(input, &other.to_string()),
    })
}

/// Open a session from the resolved connection string
pub fn open_session(settings: &Settings) -> anyhow::Result<MssqlSession> {
    let conn_str = settings.require_connection()?;
    MssqlSession::from_ado_string(conn_str).map_err(|err| {
        HelpfulError::new("Invalid connection string")
            .with_context(err.to_string())
            .with_suggestions([
                "TRY: Use ADO.NET syntax: server=tcp:host,1433;user=...;password=...",
            ])
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object() {
        let name = parse_object("[sales].[Get.Orders]").unwrap();
        assert_eq!(name, ObjectName::new("sales", "Get.Orders"));

        let err = parse_object("a.b.c").unwrap_err();
        assert!(err.message.contains("a.b.c"));
        assert!(!err.suggestions.is_empty());
    }
}
