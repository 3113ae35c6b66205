use std::path::{Path, PathBuf};

use catalog_core::export::{render_catalog_export, suggested_export_file_name};
use catalog_core::util::unix_millis_now;

use crate::cli::ExportFormat;
use crate::commands::common::open_catalog;
use crate::error::CliError;

pub async fn run_export(
    format: ExportFormat,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let rendered = export_catalog(format, db_path).await?;

    if let Some(path) = output_path {
        let path = resolve_output_path(path, format, unix_millis_now());
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

pub async fn export_catalog(format: ExportFormat, db_path: &Path) -> Result<String, CliError> {
    let snapshot = open_catalog(db_path).await?.snapshot().await?;
    tracing::debug!(
        brands = snapshot.brands.len(),
        sub_brands = snapshot.sub_brands.len(),
        models = snapshot.models.len(),
        "Exporting catalog"
    );
    Ok(render_catalog_export(&snapshot, format.into())?)
}

/// A directory target gets a timestamped file name inside it.
pub fn resolve_output_path(path: &Path, format: ExportFormat, timestamp_ms: i64) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(format.into(), timestamp_ms))
    } else {
        path.to_path_buf()
    }
}
