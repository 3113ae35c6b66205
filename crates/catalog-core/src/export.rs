//! Catalog export helpers shared by the CLI and admin tooling.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::models::{Brand, BrandId, Model, SubBrand, SubBrandId};

/// Export output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Every entity in the catalog, each list ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogExport {
    pub brands: Vec<Brand>,
    pub sub_brands: Vec<SubBrand>,
    pub models: Vec<Model>,
}

/// Render the catalog as pretty-printed JSON.
pub fn render_json_export(catalog: &CatalogExport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(catalog)
}

/// Render the catalog as a Markdown outline: brand, then sub-brands, then models.
///
/// Sub-brands whose brand is missing are listed under a trailing
/// "Unassigned" heading so nothing is silently dropped.
#[must_use]
pub fn render_markdown_export(catalog: &CatalogExport) -> String {
    let mut sub_brands_by_brand: HashMap<BrandId, Vec<&SubBrand>> = HashMap::new();
    for sub_brand in &catalog.sub_brands {
        sub_brands_by_brand
            .entry(sub_brand.brand_id)
            .or_default()
            .push(sub_brand);
    }
    let mut models_by_sub_brand: HashMap<SubBrandId, Vec<&Model>> = HashMap::new();
    for model in &catalog.models {
        models_by_sub_brand
            .entry(model.sub_brand_id)
            .or_default()
            .push(model);
    }

    let mut output = String::new();
    for (index, brand) in catalog.brands.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let _ = writeln!(output, "# {} (`{}`)", brand.name, brand.slug);
        if let Some(logo) = &brand.logo {
            let _ = writeln!(output, "\n![{} logo]({logo})", brand.name);
        }

        for sub_brand in sub_brands_by_brand.remove(&brand.id).unwrap_or_default() {
            write_sub_brand(&mut output, sub_brand, &mut models_by_sub_brand);
        }
    }

    let mut orphans: Vec<&SubBrand> = sub_brands_by_brand.into_values().flatten().collect();
    orphans.sort_by_key(|sub_brand| sub_brand.name.to_lowercase());
    if !orphans.is_empty() {
        if !output.is_empty() {
            output.push('\n');
        }
        let _ = writeln!(output, "# Unassigned");
        for sub_brand in orphans {
            write_sub_brand(&mut output, sub_brand, &mut models_by_sub_brand);
        }
    }

    output
}

fn write_sub_brand(
    output: &mut String,
    sub_brand: &SubBrand,
    models_by_sub_brand: &mut HashMap<SubBrandId, Vec<&Model>>,
) {
    let _ = writeln!(output, "\n## {} (`{}`)\n", sub_brand.name, sub_brand.slug);
    let models = models_by_sub_brand
        .remove(&sub_brand.id)
        .unwrap_or_default();
    if models.is_empty() {
        let _ = writeln!(output, "_No models yet._");
    }
    for model in models {
        let _ = write!(output, "- **{}** (`{}`)", model.name, model.slug);
        if let Some(description) = &model.description {
            let _ = write!(output, ": {description}");
        }
        if !model.images.is_empty() {
            let _ = write!(output, " [{} image(s)]", model.images.len());
        }
        output.push('\n');
    }
}

/// Render the catalog based on selected export format.
pub fn render_catalog_export(
    catalog: &CatalogExport,
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(catalog),
        ExportFormat::Markdown => Ok(render_markdown_export(catalog)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("catalog-export-{timestamp_ms}.{}", format.extension())
}
