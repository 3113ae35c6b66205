//! Brand repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_id, unique_slug};
use crate::error::{Error, Result};
use crate::models::{Brand, BrandId};
use crate::util::unix_millis_now;

const BRAND_COLUMNS: &str = "id, name, slug, logo, created_at, updated_at";

/// Trait for brand storage operations
pub trait BrandRepository {
    /// Create a new brand
    fn create(&self, name: &str, logo: Option<&str>) -> Result<Brand>;

    /// Get a brand by ID
    fn get(&self, id: &BrandId) -> Result<Option<Brand>>;

    /// Get a brand by its URL slug
    fn get_by_slug(&self, slug: &str) -> Result<Option<Brand>>;

    /// List all brands ordered by name
    fn list(&self) -> Result<Vec<Brand>>;

    /// Rename a brand and replace its logo
    ///
    /// Sub-brands and models carrying the old brand name are updated too.
    fn update(&self, id: &BrandId, name: &str, logo: Option<&str>) -> Result<Brand>;

    /// Delete a brand that no longer owns sub-brands
    fn delete(&self, id: &BrandId) -> Result<Brand>;

    /// Number of brands
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `BrandRepository`
pub struct SqliteBrandRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteBrandRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a brand from a database row
    fn parse_brand(row: &rusqlite::Row<'_>) -> rusqlite::Result<Brand> {
        Ok(Brand {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            logo: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

impl BrandRepository for SqliteBrandRepository<'_> {
    fn create(&self, name: &str, logo: Option<&str>) -> Result<Brand> {
        let mut brand = Brand::new(name, logo.map(str::to_string));
        brand.slug = unique_slug(self.conn, "brands", &brand.name, None)?;

        self.conn.execute(
            "INSERT INTO brands (id, name, slug, logo, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                brand.id.as_str(),
                brand.name,
                brand.slug,
                brand.logo,
                brand.created_at,
                brand.updated_at
            ],
        )?;

        Ok(brand)
    }

    fn get(&self, id: &BrandId) -> Result<Option<Brand>> {
        let brand = self
            .conn
            .query_row(
                &format!("SELECT {BRAND_COLUMNS} FROM brands WHERE id = ?"),
                params![id.as_str()],
                Self::parse_brand,
            )
            .optional()?;
        Ok(brand)
    }

    fn get_by_slug(&self, slug: &str) -> Result<Option<Brand>> {
        let brand = self
            .conn
            .query_row(
                &format!("SELECT {BRAND_COLUMNS} FROM brands WHERE slug = ?"),
                params![slug],
                Self::parse_brand,
            )
            .optional()?;
        Ok(brand)
    }

    fn list(&self) -> Result<Vec<Brand>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BRAND_COLUMNS} FROM brands ORDER BY name COLLATE NOCASE, created_at"
        ))?;

        let brands = stmt
            .query_map([], Self::parse_brand)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(brands)
    }

    fn update(&self, id: &BrandId, name: &str, logo: Option<&str>) -> Result<Brand> {
        let now = unix_millis_now();
        let key = id.as_str();
        let slug = unique_slug(self.conn, "brands", name, Some(key.as_str()))?;

        let tx = self.conn.unchecked_transaction()?;
        let rows = tx.execute(
            "UPDATE brands SET name = ?, slug = ?, logo = ?, updated_at = ? WHERE id = ?",
            params![name, slug, logo, now, key],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("brand {id}")));
        }

        tx.execute(
            "UPDATE sub_brands SET brand_name = ? WHERE brand_id = ?",
            params![name, key],
        )?;
        tx.execute(
            "UPDATE models SET brand_name = ?
             WHERE sub_brand_id IN (SELECT id FROM sub_brands WHERE brand_id = ?)",
            params![name, key],
        )?;
        tx.commit()?;

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("brand {id}")))
    }

    fn delete(&self, id: &BrandId) -> Result<Brand> {
        let brand = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("brand {id}")))?;

        let sub_brands: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sub_brands WHERE brand_id = ?",
            params![id.as_str()],
            |row| row.get(0),
        )?;
        if sub_brands > 0 {
            return Err(Error::Conflict(format!(
                "brand \"{}\" still has {sub_brands} sub-brand(s)",
                brand.name
            )));
        }

        self.conn
            .execute("DELETE FROM brands WHERE id = ?", params![id.as_str()])?;
        Ok(brand)
    }

    fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM brands", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteSubBrandRepository, SubBrandRepository};

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_get() {
        let db = setup();
        let repo = SqliteBrandRepository::new(db.connection());

        let brand = repo.create("Toyota", Some("/uploads/brands/t.png")).unwrap();
        assert_eq!(brand.slug, "toyota");

        let fetched = repo.get(&brand.id).unwrap().unwrap();
        assert_eq!(fetched, brand);

        let by_slug = repo.get_by_slug("toyota").unwrap().unwrap();
        assert_eq!(by_slug.id, brand.id);
        assert!(repo.get_by_slug("lexus").unwrap().is_none());
    }

    #[test]
    fn test_slug_collision_gets_suffix() {
        let db = setup();
        let repo = SqliteBrandRepository::new(db.connection());

        let first = repo.create("Mini", None).unwrap();
        let second = repo.create("MINI", None).unwrap();
        let third = repo.create("mini!", None).unwrap();

        assert_eq!(first.slug, "mini");
        assert_eq!(second.slug, "mini-2");
        assert_eq!(third.slug, "mini-3");
    }

    #[test]
    fn test_list_sorted_by_name() {
        let db = setup();
        let repo = SqliteBrandRepository::new(db.connection());

        repo.create("volvo", None).unwrap();
        repo.create("Audi", None).unwrap();
        repo.create("BMW", None).unwrap();

        let names: Vec<String> = repo.list().unwrap().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["Audi", "BMW", "volvo"]);
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn test_update_renames_and_propagates() {
        let db = setup();
        let brands = SqliteBrandRepository::new(db.connection());
        let sub_brands = SqliteSubBrandRepository::new(db.connection());

        let brand = brands.create("Datsun", None).unwrap();
        let line = sub_brands.create("Fairlady", &brand.id).unwrap();
        assert_eq!(line.brand_name, "Datsun");

        let renamed = brands.update(&brand.id, "Nissan", None).unwrap();
        assert_eq!(renamed.slug, "nissan");
        assert!(renamed.updated_at >= brand.updated_at);

        let line = sub_brands.get(&line.id).unwrap().unwrap();
        assert_eq!(line.brand_name, "Nissan");
    }

    #[test]
    fn test_update_keeps_own_slug() {
        let db = setup();
        let repo = SqliteBrandRepository::new(db.connection());

        let brand = repo.create("Kia", None).unwrap();
        let updated = repo.update(&brand.id, "KIA", Some("/uploads/brands/k.png")).unwrap();
        assert_eq!(updated.slug, "kia");
        assert_eq!(updated.logo.as_deref(), Some("/uploads/brands/k.png"));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let db = setup();
        let repo = SqliteBrandRepository::new(db.connection());

        let err = repo.update(&BrandId::new(), "Ghost", None).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_delete_rejects_brand_with_sub_brands() {
        let db = setup();
        let brands = SqliteBrandRepository::new(db.connection());
        let sub_brands = SqliteSubBrandRepository::new(db.connection());

        let brand = brands.create("Hyundai", None).unwrap();
        let line = sub_brands.create("Genesis", &brand.id).unwrap();

        let err = brands.delete(&brand.id).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));

        sub_brands.delete(&line.id).unwrap();
        let deleted = brands.delete(&brand.id).unwrap();
        assert_eq!(deleted.id, brand.id);
        assert!(brands.get(&brand.id).unwrap().is_none());
    }
}
