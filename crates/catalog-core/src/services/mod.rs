//! Async services shared by the catalog front-ends.

mod catalog;

pub use catalog::{BrandPage, CatalogService, CatalogStats, SubBrandListing};
