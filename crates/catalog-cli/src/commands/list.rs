use std::path::Path;

use serde::Serialize;

use crate::cli::EntityKind;
use crate::commands::common::{
    format_brand_lines, format_model_lines, format_sub_brand_lines, open_catalog,
};
use crate::error::CliError;

pub async fn run_list(kind: EntityKind, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let catalog = open_catalog(db_path).await?;

    match kind {
        EntityKind::Brands => {
            let brands = catalog.list_brands().await?;
            print_items(&brands, as_json, format_brand_lines)
        }
        EntityKind::SubBrands => {
            let sub_brands = catalog.list_sub_brands().await?;
            print_items(&sub_brands, as_json, format_sub_brand_lines)
        }
        EntityKind::Models => {
            let models = catalog.list_models().await?;
            print_items(&models, as_json, format_model_lines)
        }
    }
}

fn print_items<T: Serialize>(
    items: &[T],
    as_json: bool,
    format_lines: fn(&[T]) -> Vec<String>,
) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        for line in format_lines(items) {
            println!("{line}");
        }
    }
    Ok(())
}
