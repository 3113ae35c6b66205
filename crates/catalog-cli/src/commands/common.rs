use std::env;
use std::path::{Path, PathBuf};

use catalog_core::search::SearchResult;
use catalog_core::services::CatalogStats;
use catalog_core::{Brand, CatalogService, Model, SubBrand};

use crate::error::CliError;

const DEFAULT_DB_PATH: &str = "catalog.db";
const NAME_WIDTH: usize = 30;

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("CATALOG_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
}

pub async fn open_catalog(path: &Path) -> Result<CatalogService, CliError> {
    Ok(CatalogService::open_path(path.to_path_buf()).await?)
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn short_id(id: &impl ToString) -> String {
    id.to_string().chars().take(8).collect()
}

/// Collapse whitespace and cut to `max_chars`, marking the cut with "...".
pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_search_lines(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            let name = preview(&result.name, NAME_WIDTH);
            let path = result.catalog_path().unwrap_or_else(|| "-".to_string());
            format!("{:<9}  {name:<NAME_WIDTH$}  {path}", result.kind.label())
        })
        .collect()
}

pub fn format_brand_lines(brands: &[Brand]) -> Vec<String> {
    brands
        .iter()
        .map(|brand| {
            let name = preview(&brand.name, NAME_WIDTH);
            let logo = if brand.logo.is_some() { "logo" } else { "" };
            format!(
                "{}  {name:<NAME_WIDTH$}  /brand/{:<24}  {logo}",
                short_id(&brand.id),
                brand.slug
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

pub fn format_sub_brand_lines(sub_brands: &[SubBrand]) -> Vec<String> {
    sub_brands
        .iter()
        .map(|sub_brand| {
            let name = preview(&sub_brand.name, NAME_WIDTH);
            format!(
                "{}  {name:<NAME_WIDTH$}  {}",
                short_id(&sub_brand.id),
                sub_brand.brand_name
            )
            .trim_end()
            .to_string()
        })
        .collect()
}

pub fn format_model_lines(models: &[Model]) -> Vec<String> {
    models
        .iter()
        .map(|model| {
            let name = preview(&model.name, NAME_WIDTH);
            let lineage = format!("{} / {}", model.brand_name, model.sub_brand_name);
            let cover = model.cover_image().map_or_else(String::new, |url| {
                format!("  {} image(s), cover {url}", model.images.len())
            });
            format!("{}  {name:<NAME_WIDTH$}  {lineage}{cover}", short_id(&model.id))
        })
        .collect()
}

pub fn format_stats_lines(stats: &CatalogStats) -> Vec<String> {
    vec![
        format!("Brands:      {}", stats.brands),
        format!("Sub-brands:  {}", stats.sub_brands),
        format!("Models:      {}", stats.models),
    ]
}
