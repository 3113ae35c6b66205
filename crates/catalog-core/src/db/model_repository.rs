//! Model repository implementation

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{parse_id, unique_slug, SqliteSubBrandRepository, SubBrandRepository};
use crate::error::{Error, Result};
use crate::models::{Model, ModelId, SubBrandId};
use crate::util::unix_millis_now;

const MODEL_COLUMNS: &str = "id, name, slug, description, sub_brand_id, sub_brand_name, \
                             brand_name, images, created_at, updated_at";

/// Writable fields of a model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDraft {
    pub name: String,
    pub description: Option<String>,
    pub sub_brand_id: SubBrandId,
    /// Public image URLs in display order
    pub images: Vec<String>,
}

/// Trait for model storage operations
pub trait ModelRepository {
    /// Create a model under an existing sub-brand
    fn create(&self, draft: &ModelDraft) -> Result<Model>;

    /// Get a model by ID
    fn get(&self, id: &ModelId) -> Result<Option<Model>>;

    /// Get a model by its URL slug
    fn get_by_slug(&self, slug: &str) -> Result<Option<Model>>;

    /// List all models ordered by name
    fn list(&self) -> Result<Vec<Model>>;

    /// List the models of one sub-brand ordered by name
    fn list_by_sub_brand(&self, sub_brand_id: &SubBrandId) -> Result<Vec<Model>>;

    /// Replace every writable field of a model
    fn update(&self, id: &ModelId, draft: &ModelDraft) -> Result<Model>;

    /// Delete a model, returning it so its images can be cleaned up
    fn delete(&self, id: &ModelId) -> Result<Model>;

    /// Number of models
    fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `ModelRepository`
pub struct SqliteModelRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteModelRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a model from a database row
    fn parse_model(row: &rusqlite::Row<'_>) -> rusqlite::Result<Model> {
        let images_json: String = row.get(7)?;
        let images: Vec<String> = serde_json::from_str(&images_json).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(error))
        })?;

        Ok(Model {
            id: parse_id(row, 0)?,
            name: row.get(1)?,
            slug: row.get(2)?,
            description: row.get(3)?,
            sub_brand_id: parse_id(row, 4)?,
            sub_brand_name: row.get(5)?,
            brand_name: row.get(6)?,
            images,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn query_one(&self, column: &str, value: &str) -> Result<Option<Model>> {
        let model = self
            .conn
            .query_row(
                &format!("SELECT {MODEL_COLUMNS} FROM models WHERE {column} = ?"),
                params![value],
                Self::parse_model,
            )
            .optional()?;
        Ok(model)
    }
}

impl ModelRepository for SqliteModelRepository<'_> {
    fn create(&self, draft: &ModelDraft) -> Result<Model> {
        let sub_brand = SqliteSubBrandRepository::new(self.conn)
            .get(&draft.sub_brand_id)?
            .ok_or_else(|| Error::NotFound(format!("sub-brand {}", draft.sub_brand_id)))?;

        let mut model = Model::new(
            draft.name.clone(),
            draft.description.clone(),
            &sub_brand,
            draft.images.clone(),
        );
        model.slug = unique_slug(self.conn, "models", &model.name, None)?;

        self.conn.execute(
            "INSERT INTO models (id, name, slug, description, sub_brand_id, sub_brand_name,
                                 brand_name, images, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                model.id.as_str(),
                model.name,
                model.slug,
                model.description,
                model.sub_brand_id.as_str(),
                model.sub_brand_name,
                model.brand_name,
                serde_json::to_string(&model.images)?,
                model.created_at,
                model.updated_at
            ],
        )?;

        Ok(model)
    }

    fn get(&self, id: &ModelId) -> Result<Option<Model>> {
        self.query_one("id", &id.as_str())
    }

    fn get_by_slug(&self, slug: &str) -> Result<Option<Model>> {
        self.query_one("slug", slug)
    }

    fn list(&self) -> Result<Vec<Model>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM models ORDER BY name COLLATE NOCASE, created_at"
        ))?;

        let models = stmt
            .query_map([], Self::parse_model)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(models)
    }

    fn list_by_sub_brand(&self, sub_brand_id: &SubBrandId) -> Result<Vec<Model>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM models WHERE sub_brand_id = ?
             ORDER BY name COLLATE NOCASE, created_at"
        ))?;

        let models = stmt
            .query_map(params![sub_brand_id.as_str()], Self::parse_model)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(models)
    }

    fn update(&self, id: &ModelId, draft: &ModelDraft) -> Result<Model> {
        let sub_brand = SqliteSubBrandRepository::new(self.conn)
            .get(&draft.sub_brand_id)?
            .ok_or_else(|| Error::NotFound(format!("sub-brand {}", draft.sub_brand_id)))?;

        let now = unix_millis_now();
        let key = id.as_str();
        let slug = unique_slug(self.conn, "models", &draft.name, Some(key.as_str()))?;

        let rows = self.conn.execute(
            "UPDATE models SET name = ?, slug = ?, description = ?, sub_brand_id = ?,
                               sub_brand_name = ?, brand_name = ?, images = ?, updated_at = ?
             WHERE id = ?",
            params![
                draft.name,
                slug,
                draft.description,
                sub_brand.id.as_str(),
                sub_brand.name,
                sub_brand.brand_name,
                serde_json::to_string(&draft.images)?,
                now,
                key
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("model {id}")));
        }

        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("model {id}")))
    }

    fn delete(&self, id: &ModelId) -> Result<Model> {
        let model = self
            .get(id)?
            .ok_or_else(|| Error::NotFound(format!("model {id}")))?;

        self.conn
            .execute("DELETE FROM models WHERE id = ?", params![id.as_str()])?;
        Ok(model)
    }

    fn count(&self) -> Result<usize> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM models", [], |row| row.get(0))?;
        Ok(count)
    }
}
