//! Sub-brand repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_id, unique_slug, BrandRepository, SqliteBrandRepository};
use crate::error::{Error, Result};
use crate::models::{BrandId, SubBrand, SubBrandId};
use crate::util::unix_millis_now;

const SUB_BRAND_COLUMNS: &str = "id, name, slug, brand_id, brand_name, created_at, updated_at";

/// Trait for sub-brand storage operations
pub trait SubBrandRepository {
    /// Create a sub-brand under an existing brand
    fn create(&self, name: &str, brand_id: &BrandId) -> Result<SubBrand>;

    /// Get a sub-brand by ID
    fn get(&self, id: &SubBrandId) -> Result<Option<SubBrand>>;

    /// Get a sub-brand by its URL slug
    fn get_by_slug(&self, slug: &str) -> Result<Option<SubBrand>>;

    /// List all sub-brands ordered by name
    fn list(&self) -> Result<Vec<SubBrand>>;

    /// List the sub-brands of one brand ordered by name
    fn list_by_brand(&self, brand_id: &BrandId) -> Result<Vec<SubBrand>>;

    /// Rename a sub-brand and/or move it to another brand
    fn update(&self, id: &SubBrandId, name: &str, brand_id: &BrandId) -> Result<SubBrand>;

    /// Delete a sub-brand that no longer owns models
    fn delete(&self, id: &SubBrandId) -> Result<SubBrand>;

    /// Number of sub-brands
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `SubBrandRepository`
pub struct SqliteSubBrandRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSubBrandRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_sub_brand(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubBrand> {
        Ok(SubBrand {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            brand_id: parse_id(row, 3)?,
            brand_name: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn query_one(&self, column: &str, value: &str) -> Result<Option<SubBrand>> {
        let sub_brand = self
            .conn
            .query_row(
                &format!("SELECT {SUB_BRAND_COLUMNS} FROM sub_brands WHERE {column} = ?"),
                params![value],
                Self::parse_sub_brand,
            )
            .optional()?;
        Ok(sub_brand)
    }
}

impl SubBrandRepository for SqliteSubBrandRepository<'_> {
    fn create(&self, name: &str, brand_id: &BrandId) -> Result<SubBrand> {
        let brand = SqliteBrandRepository::new(self.conn)
            .get(brand_id)?
            .ok_or_else(|| Error::NotFound(format!("brand {brand_id}")))?;

        let mut sub_brand = SubBrand::new(name, &brand);
        sub_brand.slug = unique_slug(self.conn, "sub_brands", &sub_brand.name, None)?;

        self.conn.execute(
            "INSERT INTO sub_brands (id, name, slug, brand_id, brand_name, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                sub_brand.id.as_str(),
                sub_brand.name,
                sub_brand.slug,
                sub_brand.brand_id.as_str(),
                sub_brand.brand_name,
                sub_brand.created_at,
                sub_brand.updated_at
            ],
        )?;

        Ok(sub_brand)
    }

    fn get(&self, id: &SubBrandId) -> Result<Option<SubBrand>> {
        self.query_one("id", &id.as_str())
    }

    fn get_by_slug(&self, slug: &str) -> Result<Option<SubBrand>> {
        self.query_one("slug", slug)
    }

    fn list(&self) -> Result<Vec<SubBrand>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUB_BRAND_COLUMNS} FROM sub_brands ORDER BY name COLLATE NOCASE, created_at"
        ))?;

        let sub_brands = stmt
            .query_map([], Self::parse_sub_brand)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sub_brands)
    }

    fn list_by_brand(&self, brand_id: &BrandId) -> Result<Vec<SubBrand>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUB_BRAND_COLUMNS} FROM sub_brands WHERE brand_id = ?
             ORDER BY name COLLATE NOCASE, created_at"
        ))?;

        let sub_brands = stmt
            .query_map(params![brand_id.as_str()], Self::parse_sub_brand)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sub_brands)
    }

    fn update(&self, id: &SubBrandId, name: &str, brand_id: &BrandId) -> Result<SubBrand> {
        let brand = SqliteBrandRepository::new(self.conn)
            .get(brand_id)?
            .ok_or_else(|| Error::NotFound(format!("brand {brand_id}")))?;

        let now = unix_millis_now();
        let key = id.as_str();
        let slug = unique_slug(self.conn, "sub_brands", name, Some(key.as_str()))?;

        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE sub_brands SET name = ?, slug = ?, brand_id = ?, brand_name = ?, updated_at = ?
             WHERE id = ?",
            params![name, slug, brand.id.as_str(), brand.name, now, key],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("sub-brand {id}")));
        }

        tx.execute(
            "UPDATE models SET sub_brand_name = ?, brand_name = ? WHERE sub_brand_id = ?",
            params![name, brand.name, key],
        )?;
        tx.commit()?;

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("sub-brand {id}")))
    }

    fn delete(&self, id: &SubBrandId) -> Result<SubBrand> {
        let sub_brand = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("sub-brand {id}")))?;

        let models: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM models WHERE sub_brand_id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if models > 0 {
            return Err(Error::Conflict(format!(
                "sub-brand \"{}\" still has {models} model(s)",
                sub_brand.name
            )));
        }

        self.conn
            .execute("DELETE FROM sub_brands WHERE id = ?", params![id.as_str()])?;
        Ok(sub_brand)
    }

    fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM sub_brands", [], |row| row.get(0))?;
        Ok(count)
    }
}
