//! Catalog document import.
//!
//! The catalog JSON has gone through several shapes: `category` became
//! `section`/`protein`, the scalar `cooking_method` became the
//! `cooking_methods` list, and `content_text` was added next to `content`.
//! Every revision is read into `RawRecipe` and migrated to the canonical
//! `Recipe` here, so nothing downstream sees the older field names.

use serde::Deserialize;

use crate::models::{ContentType, Recipe, NO_PROTEIN};
use crate::utils::title_case;

use super::CatalogError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRecipe {
    id: String,
    title: String,
    badge: Option<String>,
    section: Option<String>,
    section_name: Option<String>,
    category: Option<String>,
    protein: Option<String>,
    protein_name: Option<String>,
    cooking_methods: Option<Vec<String>>,
    cooking_method: Option<String>,
    content_type: Option<String>,
    temperature: Option<f64>,
    time_hours: Option<f64>,
    content: String,
    content_text: Option<String>,
    #[serde(rename = "searchText")]
    search_text: Option<String>,
}

impl From<RawRecipe> for Recipe {
    fn from(raw: RawRecipe) -> Self {
        let section = non_empty(raw.section)
            .or_else(|| non_empty(raw.category))
            .unwrap_or_default();
        let section_name = non_empty(raw.section_name).unwrap_or_else(|| title_case(&section));

        let protein = non_empty(raw.protein).unwrap_or_else(|| NO_PROTEIN.to_string());
        let protein_name = non_empty(raw.protein_name).unwrap_or_else(|| title_case(&protein));

        let mut cooking_methods: Vec<String> = Vec::new();
        for method in raw
            .cooking_methods
            .unwrap_or_default()
            .into_iter()
            .chain(raw.cooking_method)
        {
            if !method.is_empty() && !cooking_methods.contains(&method) {
                cooking_methods.push(method);
            }
        }

        Recipe {
            id: raw.id,
            title: raw.title,
            badge: raw.badge,
            section,
            section_name,
            protein,
            protein_name,
            cooking_methods,
            content_type: raw.content_type.map(ContentType::from).unwrap_or_default(),
            temperature: raw.temperature,
            time_hours: raw.time_hours,
            content: raw.content,
            content_text: raw.content_text,
            search_text: raw.search_text,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a catalog document (a JSON array of records) into canonical recipes.
/// Source order is preserved.
pub fn parse_catalog(json: &str) -> Result<Vec<Recipe>, CatalogError> {
    let raw: Vec<RawRecipe> = serde_json::from_str(json)?;
    Ok(raw.into_iter().map(Recipe::from).collect())
}
