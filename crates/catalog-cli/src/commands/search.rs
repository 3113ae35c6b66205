use std::path::Path;

use crate::commands::common::{format_search_lines, normalize_search_query, open_catalog};
use crate::error::CliError;

pub async fn run_search(query: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let catalog = open_catalog(db_path).await?;
    let outcome = catalog.search(&normalized_query).await?;
    tracing::debug!(results = outcome.results.len(), "Search finished");

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for line in format_search_lines(&outcome.results) {
            println!("{line}");
        }
    }

    Ok(())
}
