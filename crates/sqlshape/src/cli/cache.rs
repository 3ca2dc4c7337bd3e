//! Cache commands - inspect cached result sets without a database

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use sqlshape_db::{ResultSet, ResultSetCache};

use super::config::Settings;
use super::error::HelpfulError;
use super::output::{build_table, print_fields, print_json};

/// Subcommands for `cache`
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// List cached result sets
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one cached result set
    Show {
        /// Procedure name (e.g., dbo.GetUsers)
        object: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Serialize)]
struct CacheEntry {
    object: String,
    path: String,
    fields: usize,
}

pub fn run(action: CacheAction, settings: &Settings) -> Result<()> {
    let dir = settings.require_result_sets_dir()?;
    let cache = ResultSetCache::new(dir, false);

    match action {
        CacheAction::List { json } => list(&cache, json),
        CacheAction::Show { object, json } => show(&cache, &object, json),
    }
}

fn list(cache: &ResultSetCache, json: bool) -> Result<()> {
    let entries = cache
        .list()?
        .into_iter()
        .map(|name| {
            // An unreadable entry still shows up, with zero fields.
            let fields = cache.load(&name).map(|rs| rs.len()).unwrap_or(0);
            CacheEntry {
                object: name.to_string(),
                path: cache.path_for(&name).display().to_string(),
                fields,
            }
        })
        .collect::<Vec<_>>();

    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No cached result sets in {}", cache.dir().display());
        return Ok(());
    }

    let rows = entries
        .into_iter()
        .map(|e| vec![e.object, e.fields.to_string(), e.path])
        .collect();
    println!("{}", build_table(&["OBJECT", "FIELDS", "PATH"], rows));
    Ok(())
}

fn show(cache: &ResultSetCache, object: &str, json: bool) -> Result<()> {
    let name = super::parse_object(object)?;
    let fields: ResultSet = match cache.load(&name) {
        Ok(fields) => fields,
        Err(err) if err.is_cache_miss() => {
            return Err(HelpfulError::not_cached(&name.to_string(), cache.dir()).into())
        }
        Err(err) => return Err(err.into()),
    };

    if json {
        return print_json(&fields);
    }
    print_fields(&fields);
    Ok(())
}
