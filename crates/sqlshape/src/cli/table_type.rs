//! Table-type command - columns of a user-defined table type

use anyhow::{Context, Result};
use clap::Args;
use sqlshape_db::{MetadataConfig, MetadataHelper};

use super::config::Settings;
use super::output::{print_fields, print_json};

/// Arguments for the `table-type` command
#[derive(Debug, Args)]
pub struct TableTypeArgs {
    /// Table type name (e.g., dbo.IdList)
    pub object: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: TableTypeArgs, settings: &Settings) -> Result<()> {
    let object = super::parse_object(&args.object)?;
    let session = super::open_session(settings)?;

    // Table types are never cached.
    let helper = MetadataHelper::new(session, MetadataConfig::default())?;
    let fields = helper
        .get_table_type_fields(&object)
        .with_context(|| format!("Failed to read columns of table type {}", object))?;
    helper.session().close();

    if args.json {
        return print_json(&fields);
    }

    if fields.is_empty() {
        println!("No columns found for table type {}", object);
    } else {
        print_fields(&fields);
    }
    Ok(())
}
