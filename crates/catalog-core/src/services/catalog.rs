//! Shared catalog service wrapper used by the API and CLI.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::db::{
    BrandRepository, Database, ModelDraft, ModelRepository, SqliteBrandRepository,
    SqliteModelRepository, SqliteSubBrandRepository, SubBrandRepository,
};
use crate::export::CatalogExport;
use crate::models::{Brand, BrandId, Model, ModelId, SubBrand, SubBrandId};
use crate::search::{self, SearchOutcome};
use crate::util::normalize_text_option;
use crate::{Error, Result};

/// Entity counts shown on the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub brands: usize,
    pub sub_brands: usize,
    pub models: usize,
}

/// A sub-brand with its models, as shown on a brand page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubBrandListing {
    #[serde(flatten)]
    pub sub_brand: SubBrand,
    pub models: Vec<Model>,
}

/// Everything needed to render one brand page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandPage {
    pub brand: Brand,
    pub sub_brands: Vec<SubBrandListing>,
}

/// Thread-safe service for catalog reads and admin writes.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<Mutex<Database>>,
}

impl CatalogService {
    /// Open the catalog at the given filesystem path, creating parent directories.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tracing::info!("Opening catalog database at {}", db_path.display());
        let db = Database::open(&db_path)?;
        Ok(Self::from_database(db))
    }

    /// Open an in-memory catalog (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    fn from_database(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// List brands ordered by name.
    pub async fn list_brands(&self) -> Result<Vec<Brand>> {
        let db = self.db.lock().await;
        SqliteBrandRepository::new(db.connection()).list()
    }

    /// List sub-brands ordered by name.
    pub async fn list_sub_brands(&self) -> Result<Vec<SubBrand>> {
        let db = self.db.lock().await;
        SqliteSubBrandRepository::new(db.connection()).list()
    }

    /// List models ordered by name.
    pub async fn list_models(&self) -> Result<Vec<Model>> {
        let db = self.db.lock().await;
        SqliteModelRepository::new(db.connection()).list()
    }

    /// Read all three entity lists under one lock.
    pub async fn snapshot(&self) -> Result<CatalogExport> {
        let db = self.db.lock().await;
        let conn = db.connection();
        Ok(CatalogExport {
            brands: SqliteBrandRepository::new(conn).list()?,
            sub_brands: SqliteSubBrandRepository::new(conn).list()?,
            models: SqliteModelRepository::new(conn).list()?,
        })
    }

    /// Run a catalog search against the current contents.
    ///
    /// Queries too short to match skip the database entirely.
    pub async fn search(&self, query: &str) -> Result<SearchOutcome> {
        if search::searchable_query(query).is_none() {
            return Ok(search::search(query, &[], &[], &[]));
        }

        let catalog = self.snapshot().await?;
        Ok(search::search(
            query,
            &catalog.brands,
            &catalog.sub_brands,
            &catalog.models,
        ))
    }

    /// Load a brand with its sub-brands and their models.
    pub async fn brand_page(&self, brand_slug: &str) -> Result<Option<BrandPage>> {
        let db = self.db.lock().await;
        let conn = db.connection();

        let Some(brand) = SqliteBrandRepository::new(conn).get_by_slug(brand_slug)? else {
            return Ok(None);
        };

        let models = SqliteModelRepository::new(conn);
        let sub_brands = SqliteSubBrandRepository::new(conn)
            .list_by_brand(&brand.id)?
            .into_iter()
            .map(|sub_brand| {
                let models = models.list_by_sub_brand(&sub_brand.id)?;
                Ok(SubBrandListing { sub_brand, models })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(BrandPage { brand, sub_brands }))
    }

    /// Fetch a model by slug.
    pub async fn model_by_slug(&self, slug: &str) -> Result<Option<Model>> {
        let db = self.db.lock().await;
        SqliteModelRepository::new(db.connection()).get_by_slug(slug)
    }

    /// Fetch a brand by id.
    pub async fn get_brand(&self, id: &BrandId) -> Result<Option<Brand>> {
        let db = self.db.lock().await;
        SqliteBrandRepository::new(db.connection()).get(id)
    }

    /// Fetch a model by id.
    pub async fn get_model(&self, id: &ModelId) -> Result<Option<Model>> {
        let db = self.db.lock().await;
        SqliteModelRepository::new(db.connection()).get(id)
    }

    /// Create a brand.
    pub async fn create_brand(&self, name: &str, logo: Option<&str>) -> Result<Brand> {
        let name = required_name("brand", name)?;
        let db = self.db.lock().await;
        let brand = SqliteBrandRepository::new(db.connection()).create(&name, logo)?;
        tracing::info!(entity = "brand", id = %brand.id, slug = %brand.slug, "created");
        Ok(brand)
    }

    /// Rename a brand and set its logo.
    pub async fn update_brand(
        &self,
        id: &BrandId,
        name: &str,
        logo: Option<&str>,
    ) -> Result<Brand> {
        let name = required_name("brand", name)?;
        let db = self.db.lock().await;
        let brand = SqliteBrandRepository::new(db.connection()).update(id, &name, logo)?;
        tracing::info!(entity = "brand", id = %brand.id, slug = %brand.slug, "updated");
        Ok(brand)
    }

    /// Delete a brand without sub-brands.
    pub async fn delete_brand(&self, id: &BrandId) -> Result<Brand> {
        let db = self.db.lock().await;
        let brand = SqliteBrandRepository::new(db.connection()).delete(id)?;
        tracing::info!(entity = "brand", id = %brand.id, slug = %brand.slug, "deleted");
        Ok(brand)
    }

    /// Create a sub-brand. An unknown brand is invalid input.
    pub async fn create_sub_brand(&self, name: &str, brand_id: &BrandId) -> Result<SubBrand> {
        let name = required_name("sub-brand", name)?;
        let db = self.db.lock().await;
        require_brand(&db, brand_id)?;
        let sub_brand = SqliteSubBrandRepository::new(db.connection()).create(&name, brand_id)?;
        tracing::info!(entity = "sub_brand", id = %sub_brand.id, slug = %sub_brand.slug, "created");
        Ok(sub_brand)
    }

    /// Rename a sub-brand and/or move it to another brand.
    pub async fn update_sub_brand(
        &self,
        id: &SubBrandId,
        name: &str,
        brand_id: &BrandId,
    ) -> Result<SubBrand> {
        let name = required_name("sub-brand", name)?;
        let db = self.db.lock().await;
        let repo = SqliteSubBrandRepository::new(db.connection());
        if repo.get(id)?.is_none() {
            return Err(Error::NotFound(format!("sub-brand {id}")));
        }
        require_brand(&db, brand_id)?;

        let sub_brand = repo.update(id, &name, brand_id)?;
        tracing::info!(entity = "sub_brand", id = %sub_brand.id, slug = %sub_brand.slug, "updated");
        Ok(sub_brand)
    }

    /// Delete a sub-brand without models.
    pub async fn delete_sub_brand(&self, id: &SubBrandId) -> Result<SubBrand> {
        let db = self.db.lock().await;
        let sub_brand = SqliteSubBrandRepository::new(db.connection()).delete(id)?;
        tracing::info!(entity = "sub_brand", id = %sub_brand.id, slug = %sub_brand.slug, "deleted");
        Ok(sub_brand)
    }

    /// Create a model. An unknown sub-brand is invalid input.
    pub async fn create_model(&self, draft: ModelDraft) -> Result<Model> {
        let draft = clean_draft(draft)?;
        let db = self.db.lock().await;
        require_sub_brand(&db, &draft.sub_brand_id)?;
        let model = SqliteModelRepository::new(db.connection()).create(&draft)?;
        tracing::info!(entity = "model", id = %model.id, slug = %model.slug, "created");
        Ok(model)
    }

    /// Replace a model's writable fields.
    pub async fn update_model(&self, id: &ModelId, draft: ModelDraft) -> Result<Model> {
        let draft = clean_draft(draft)?;
        let db = self.db.lock().await;
        let repo = SqliteModelRepository::new(db.connection());
        if repo.get(id)?.is_none() {
            return Err(Error::NotFound(format!("model {id}")));
        }
        require_sub_brand(&db, &draft.sub_brand_id)?;

        let model = repo.update(id, &draft)?;
        tracing::info!(entity = "model", id = %model.id, slug = %model.slug, "updated");
        Ok(model)
    }

    /// Delete a model and return it.
    pub async fn delete_model(&self, id: &ModelId) -> Result<Model> {
        let db = self.db.lock().await;
        let model = SqliteModelRepository::new(db.connection()).delete(id)?;
        tracing::info!(entity = "model", id = %model.id, slug = %model.slug, "deleted");
        Ok(model)
    }

    /// Count every entity kind.
    pub async fn stats(&self) -> Result<CatalogStats> {
        let db = self.db.lock().await;
        let conn = db.connection();
        Ok(CatalogStats {
            brands: SqliteBrandRepository::new(conn).count()?,
            sub_brands: SqliteSubBrandRepository::new(conn).count()?,
            models: SqliteModelRepository::new(conn).count()?,
        })
    }
}

fn required_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput(format!("{kind} name cannot be empty")));
    }
    Ok(name.to_string())
}

fn clean_draft(draft: ModelDraft) -> Result<ModelDraft> {
    Ok(ModelDraft {
        name: required_name("model", &draft.name)?,
        description: normalize_text_option(draft.description),
        ..draft
    })
}

/// A missing parent is a bad reference in the request, not a missing target.
fn require_brand(db: &Database, id: &BrandId) -> Result<()> {
    match SqliteBrandRepository::new(db.connection()).get(id)? {
        Some(_) => Ok(()),
        None => Err(Error::InvalidInput(format!("brand {id} does not exist"))),
    }
}

fn require_sub_brand(db: &Database, id: &SubBrandId) -> Result<()> {
    match SqliteSubBrandRepository::new(db.connection()).get(id)? {
        Some(_) => Ok(()),
        None => Err(Error::InvalidInput(format!("sub-brand {id} does not exist"))),
    }
}
