//! Database layer for the catalog

mod brand_repository;
mod connection;
mod migrations;
mod model_repository;
mod sub_brand_repository;

pub use brand_repository::{BrandRepository, SqliteBrandRepository};
pub use connection::Database;
pub use model_repository::{ModelDraft, ModelRepository, SqliteModelRepository};
pub use sub_brand_repository::{SqliteSubBrandRepository, SubBrandRepository};

use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::util::slugify;

/// Pick a slug for `name` that no other row in `table` uses.
///
/// Collisions get `-2`, `-3`, ... appended. `exclude_id` lets a row keep its
/// own slug when it is renamed to something that slugifies the same.
fn unique_slug(
    conn: &Connection,
    table: &'static str,
    name: &str,
    exclude_id: Option<&str>,
) -> Result<String> {
    let base = slugify(name);
    let sql = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE slug = ? AND id != ?)");
    let mut stmt = conn.prepare(&sql)?;
    let exclude = exclude_id.unwrap_or("");

    let mut candidate = base.clone();
    let mut suffix = 2u32;
    while stmt.query_row(params![candidate, exclude], |row| row.get::<_, bool>(0))? {
        candidate = format!("{base}-{suffix}");
        suffix += 1;
    }

    Ok(candidate)
}

/// Parse a TEXT id column into one of the typed ids.
fn parse_id<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = uuid::Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error)))
}
