//! Car model

use serde::{Deserialize, Serialize};

use super::{SubBrand, SubBrandId};
use crate::util::slugify;

define_id!(
    /// A unique identifier for a car model
    ModelId
);

/// A car model listed under a sub-brand, with its image gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier
    pub id: ModelId,
    /// Display name
    pub name: String,
    /// URL slug, unique among models
    pub slug: String,
    /// Free-text description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning sub-brand
    pub sub_brand_id: SubBrandId,
    /// Owning sub-brand's name at the time of the last write
    #[serde(default)]
    pub sub_brand_name: String,
    /// Owning brand's name at the time of the last write
    #[serde(default)]
    pub brand_name: String,
    /// Public image URLs in display order
    #[serde(default)]
    pub images: Vec<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Model {
    /// Create a new model listed under `sub_brand`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        sub_brand: &SubBrand,
        images: Vec<String>,
    ) -> Self {
        let name = name.into();
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: ModelId::new(),
            slug: slugify(&name),
            name,
            description,
            sub_brand_id: sub_brand.id,
            sub_brand_name: sub_brand.name.clone(),
            brand_name: sub_brand.brand_name.clone(),
            images,
            created_at: now,
            updated_at: now,
        }
    }

    /// First gallery image, used as the card thumbnail
    #[must_use]
    pub fn cover_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}
