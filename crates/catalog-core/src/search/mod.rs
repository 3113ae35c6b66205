//! Catalog search across brands, sub-brands, and models.
//!
//! [`search`] is a pure function over read snapshots of the three
//! collections. Each kind is matched and capped independently, the capped
//! lists are concatenated (brands, sub-brands, models) and then ranked with a
//! stable sort, so entries that tie on every ranking key keep that order.
//!
//! Caps are applied *before* ranking. A strong match that sits past the cap in
//! the input order is dropped even if it would have ranked first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{Brand, BrandId, Model, SubBrand, SubBrandId};
use crate::util::non_empty;

/// Trimmed queries shorter than this (in chars) match nothing.
pub const MIN_QUERY_CHARS: usize = 2;
/// Maximum brand matches kept before ranking.
pub const MAX_BRAND_RESULTS: usize = 5;
/// Maximum sub-brand matches kept before ranking.
pub const MAX_SUB_BRAND_RESULTS: usize = 5;
/// Maximum model matches kept before ranking.
pub const MAX_MODEL_RESULTS: usize = 10;
/// Maximum results returned after ranking.
pub const MAX_TOTAL_RESULTS: usize = 15;

/// Which collection a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SearchKind {
    Brand,
    SubBrand,
    Model,
}

impl SearchKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::SubBrand => "subBrand",
            Self::Model => "model",
        }
    }
}

/// One search hit with enough routing data to build its catalog URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_brand_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SearchResult {
    /// Public catalog path for this hit.
    ///
    /// Returns `None` when a required parent slug could not be resolved.
    #[must_use]
    pub fn catalog_path(&self) -> Option<String> {
        match self.kind {
            SearchKind::Brand => Some(format!("/brand/{}", self.slug)),
            SearchKind::SubBrand => {
                let brand = self.brand_slug.as_deref()?;
                Some(format!("/brand/{brand}/sub-brand/{}", self.slug))
            }
            SearchKind::Model => {
                let brand = self.brand_slug.as_deref()?;
                let sub_brand = self.sub_brand_slug.as_deref()?;
                Some(format!(
                    "/brand/{brand}/sub-brand/{sub_brand}/model/{}",
                    self.slug
                ))
            }
        }
    }
}

/// Ranked results paired with the trimmed query for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub query: String,
}

/// Returns the trimmed query when it is long enough to search for.
///
/// Length is counted in Unicode scalar values.
#[must_use]
pub fn searchable_query(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (trimmed.chars().count() >= MIN_QUERY_CHARS).then_some(trimmed)
}

/// Search the catalog snapshots for `query`.
#[must_use]
pub fn search(
    query: &str,
    brands: &[Brand],
    sub_brands: &[SubBrand],
    models: &[Model],
) -> SearchOutcome {
    let display_query = query.trim().to_string();
    let Some(trimmed) = searchable_query(query) else {
        return SearchOutcome {
            results: Vec::new(),
            query: display_query,
        };
    };
    let needle = trimmed.to_lowercase();

    let brands_by_id = index_first(brands, |brand| brand.id);
    let sub_brands_by_id = index_first(sub_brands, |sub_brand| sub_brand.id);

    let mut results = Vec::with_capacity(
        MAX_BRAND_RESULTS + MAX_SUB_BRAND_RESULTS + MAX_MODEL_RESULTS,
    );

    results.extend(
        brands
            .iter()
            .filter(|brand| contains_query(&brand.name, &needle))
            .take(MAX_BRAND_RESULTS)
            .map(brand_result),
    );

    results.extend(
        sub_brands
            .iter()
            .filter(|sub_brand| contains_query(&sub_brand.name, &needle))
            .take(MAX_SUB_BRAND_RESULTS)
            .map(|sub_brand| sub_brand_result(sub_brand, &brands_by_id)),
    );

    results.extend(
        models
            .iter()
            .filter(|model| model_matches(model, &needle))
            .take(MAX_MODEL_RESULTS)
            .map(|model| model_result(model, &sub_brands_by_id, &brands_by_id)),
    );

    rank(&mut results, &needle);
    results.truncate(MAX_TOTAL_RESULTS);

    SearchOutcome {
        results,
        query: display_query,
    }
}

/// Stable relevance sort: exact name, then prefix, then name order.
fn rank(results: &mut [SearchResult], needle: &str) {
    results.sort_by_cached_key(|result| {
        let name = result.name.to_lowercase();
        (name != needle, !name.starts_with(needle), name)
    });
}

fn contains_query(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(needle)
}

fn model_matches(model: &Model, needle: &str) -> bool {
    contains_query(&model.name, needle)
        || model
            .description
            .as_deref()
            .is_some_and(|description| contains_query(description, needle))
}

/// Id lookup where the first occurrence wins, like a linear scan would.
fn index_first<T, K, F>(items: &[T], key: F) -> HashMap<K, &T>
where
    K: std::hash::Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut index = HashMap::with_capacity(items.len());
    for item in items {
        index.entry(key(item)).or_insert(item);
    }
    index
}

fn brand_result(brand: &Brand) -> SearchResult {
    SearchResult {
        id: brand.id.to_string(),
        kind: SearchKind::Brand,
        name: brand.name.clone(),
        slug: brand.slug.clone(),
        brand_slug: None,
        sub_brand_slug: None,
        description: Some(format!("Car brand - {}", brand.name)),
    }
}

fn sub_brand_result(sub_brand: &SubBrand, brands: &HashMap<BrandId, &Brand>) -> SearchResult {
    let parent = brands.get(&sub_brand.brand_id).copied();
    let brand_name =
        non_empty(&sub_brand.brand_name).or_else(|| parent.map(|brand| brand.name.as_str()));

    SearchResult {
        id: sub_brand.id.to_string(),
        kind: SearchKind::SubBrand,
        name: sub_brand.name.clone(),
        slug: sub_brand.slug.clone(),
        brand_slug: parent.map(|brand| brand.slug.clone()),
        sub_brand_slug: None,
        description: brand_name.map(|name| format!("{name} category")),
    }
}

fn model_result(
    model: &Model,
    sub_brands: &HashMap<SubBrandId, &SubBrand>,
    brands: &HashMap<BrandId, &Brand>,
) -> SearchResult {
    let sub_brand = sub_brands.get(&model.sub_brand_id).copied();
    let brand = sub_brand.and_then(|sub_brand| brands.get(&sub_brand.brand_id).copied());

    // Denormalized names stand in for slugs when the parents are missing.
    let brand_slug = brand
        .map(|brand| brand.slug.as_str())
        .and_then(non_empty)
        .or_else(|| non_empty(&model.brand_name))
        .map(str::to_string);
    let sub_brand_slug = sub_brand
        .map(|sub_brand| sub_brand.slug.as_str())
        .and_then(non_empty)
        .or_else(|| non_empty(&model.sub_brand_name))
        .map(str::to_string);

    let description = model
        .description
        .as_deref()
        .and_then(non_empty)
        .map_or_else(
            || format!("{} {} model", model.brand_name, model.sub_brand_name),
            str::to_string,
        );

    SearchResult {
        id: model.id.to_string(),
        kind: SearchKind::Model,
        name: model.name.clone(),
        slug: model.slug.clone(),
        brand_slug,
        sub_brand_slug,
        description: Some(description),
    }
}
