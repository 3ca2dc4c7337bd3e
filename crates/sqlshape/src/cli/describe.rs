//! Describe command - first result set of a stored procedure

use anyhow::Result;
use clap::Args;
use sqlshape_db::{FieldSource, MetadataConfig, MetadataHelper};

use super::config::Settings;
use super::error::HelpfulError;
use super::output::{print_fields, print_json, source_note};

/// Arguments for the `describe` command
#[derive(Debug, Args)]
pub struct DescribeArgs {
    /// Procedure name (e.g., dbo.GetUsers or [sales].[Get.Orders])
    pub object: String,

    /// T-SQL batch to describe instead of the bare procedure call
    #[arg(long)]
    pub tsql: Option<String>,

    /// Skip reading and writing the result-set cache
    #[arg(long)]
    pub no_cache: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: DescribeArgs, settings: &Settings) -> Result<()> {
    let object = super::parse_object(&args.object)?;
    let session = super::open_session(settings)?;

    let metadata = metadata_for(settings, args.no_cache);
    let caching = metadata.persist_result_sets;
    let helper = MetadataHelper::new(session, metadata)?;

    let lookup = helper.describe_result_set(&object, args.tsql.as_deref(), caching);
    helper.session().close();

    if args.json {
        print_json(&lookup)?;
    } else if !lookup.fields.is_empty() {
        print_fields(&lookup.fields);
        println!("{}", source_note(lookup.source));
    }

    if lookup.source == FieldSource::Unavailable {
        return Err(HelpfulError::new(format!("Could not describe {}", object))
            .with_context(source_note(lookup.source))
            .with_suggestions([
                "TRY: Check the procedure exists and compiles".to_string(),
                "TRY: Re-run with -v to see the database error".to_string(),
                format!("TRY: Check for a cached copy: sqlshape cache show {}", object),
            ])
            .into());
    }

    Ok(())
}

/// Metadata settings for one describe call
fn metadata_for(settings: &Settings, no_cache: bool) -> MetadataConfig {
    let mut metadata = settings.metadata.clone();
    if no_cache {
        metadata.persist_result_sets = false;
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_cache_turns_persistence_off() {
        let settings = Settings {
            config_file: None,
            connection: None,
            metadata: MetadataConfig::with_cache("/srv/app"),
        };

        assert!(metadata_for(&settings, false).persist_result_sets);
        assert!(!metadata_for(&settings, true).persist_result_sets);
        assert_eq!(
            metadata_for(&settings, true).content_root,
            settings.metadata.content_root
        );
    }
}
