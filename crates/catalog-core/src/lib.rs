//! catalog-core - Core library for the car catalog
//!
//! This crate contains the shared models, database layer, search, and
//! services used by the catalog interfaces (HTTP API and CLI).

pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod search;
pub mod services;
pub mod util;

pub use error::{Error, Result};
pub use models::{Brand, BrandId, Model, ModelId, SubBrand, SubBrandId};
pub use services::CatalogService;
