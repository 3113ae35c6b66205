//! Sub-brand model

use serde::{Deserialize, Serialize};

use super::{Brand, BrandId};
use crate::util::slugify;

define_id!(
    /// A unique identifier for a sub-brand
    SubBrandId
);

/// A product line within a brand (e.g. "Lexus" under "Toyota")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubBrand {
    /// Unique identifier
    pub id: SubBrandId,
    /// Display name
    pub name: String,
    /// URL slug, unique among sub-brands
    pub slug: String,
    /// Owning brand
    pub brand_id: BrandId,
    /// Owning brand's name at the time of the last write
    #[serde(default)]
    pub brand_name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl SubBrand {
    /// Create a new sub-brand owned by `brand`
    #[must_use]
    pub fn new(name: impl Into<String>, brand: &Brand) -> Self {
        let name = name.into();
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: SubBrandId::new(),
            slug: slugify(&name),
            name,
            brand_id: brand.id,
            brand_name: brand.name.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_brand_copies_brand_name() {
        let brand = Brand::new("Toyota", None);
        let sub_brand = SubBrand::new("Land Cruiser", &brand);
        assert_eq!(sub_brand.brand_id, brand.id);
        assert_eq!(sub_brand.brand_name, "Toyota");
        assert_eq!(sub_brand.slug, "land-cruiser");
    }

    #[test]
    fn test_sub_brand_json_field_names() {
        let brand = Brand::new("Honda", None);
        let json = serde_json::to_value(SubBrand::new("Acura", &brand)).unwrap();
        assert_eq!(json["brandId"], brand.id.as_str());
        assert_eq!(json["brandName"], "Honda");
    }
}
