use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use serde::Serialize;

use crate::models::{Recipe, NO_PROTEIN};

/// Default advanced-search temperature range, °F
pub const TEMPERATURE_SLIDER: RangeInclusive<f64> = 120.0..=210.0;

/// Default advanced-search cook time range, hours
pub const TIME_SLIDER: RangeInclusive<f64> = 1.0..=48.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProteinSummary {
    pub protein: String,
    pub protein_name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct SectionSummary {
    pub section: String,
    pub section_name: String,
    pub count: usize,
    pub proteins: Vec<ProteinSummary>,
}

/// Build the table of contents.
///
/// Sections and their proteins are listed in order of first appearance in
/// the catalog; the "other" protein always sorts last within its section.
pub fn table_of_contents(recipes: &[Recipe]) -> Vec<SectionSummary> {
    let mut sections: Vec<SectionSummary> = Vec::new();

    for recipe in recipes {
        let idx = match sections.iter().position(|s| s.section == recipe.section) {
            Some(idx) => idx,
            None => {
                sections.push(SectionSummary {
                    section: recipe.section.clone(),
                    section_name: recipe.section_name.clone(),
                    count: 0,
                    proteins: Vec::new(),
                });
                sections.len() - 1
            }
        };

        let section = &mut sections[idx];
        section.count += 1;

        match section.proteins.iter_mut().find(|p| p.protein == recipe.protein) {
            Some(p) => p.count += 1,
            None => section.proteins.push(ProteinSummary {
                protein: recipe.protein.clone(),
                protein_name: recipe.protein_name.clone(),
                count: 1,
            }),
        }
    }

    for section in &mut sections {
        // Stable sort keeps first-appearance order for everything else
        section.proteins.sort_by_key(|p| p.protein == NO_PROTEIN);
    }

    sections
}

/// Unique sections sorted by key, with entry counts
pub fn category_counts(recipes: &[Recipe]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for recipe in recipes {
        *counts.entry(recipe.section.as_str()).or_default() += 1;
    }
    counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Unique cooking methods in the catalog, optionally within one section
pub fn cooking_methods(recipes: &[Recipe], section: Option<&str>) -> Vec<String> {
    recipes
        .iter()
        .filter(|r| section.map(|s| r.section == s).unwrap_or(true))
        .flat_map(|r| r.cooking_methods.iter())
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Result count line shown above the listing
pub fn result_summary(count: usize) -> String {
    if count == 1 {
        "1 recipe found".to_string()
    } else {
        format!("{} recipes found", count)
    }
}
