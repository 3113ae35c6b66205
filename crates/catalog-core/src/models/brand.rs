//! Brand model

use serde::{Deserialize, Serialize};

use crate::util::slugify;

define_id!(
    /// A unique identifier for a brand
    BrandId
);

/// A car brand, the top level of the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    /// Unique identifier
    pub id: BrandId,
    /// Display name
    pub name: String,
    /// URL slug, unique among brands
    pub slug: String,
    /// Public URL of the logo image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Brand {
    /// Create a new brand with a slug derived from its name
    #[must_use]
    pub fn new(name: impl Into<String>, logo: Option<String>) -> Self {
        let name = name.into();
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: BrandId::new(),
            slug: slugify(&name),
            name,
            logo,
            created_at: now,
            updated_at: now,
        }
    }
}
