use serde::{Deserialize, Serialize};

use crate::models::Recipe;
use crate::utils::contains_ignore_case;

/// Selector value meaning "no constraint" for section/protein/method
pub const ALL: &str = "all";

/// User-editable search state.
///
/// Every filter is optional; an unset filter (or a selector set to `"all"`)
/// imposes no constraint. Numeric bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub query: String,
    #[serde(alias = "category")]
    pub section: Option<String>,
    pub protein: Option<String>,
    pub cooking_method: Option<String>,
    pub min_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub min_time: Option<f64>,
    pub max_time: Option<f64>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.section = selector(section.into());
        self
    }

    pub fn protein(mut self, protein: impl Into<String>) -> Self {
        self.protein = selector(protein.into());
        self
    }

    pub fn cooking_method(mut self, method: impl Into<String>) -> Self {
        self.cooking_method = selector(method.into());
        self
    }

    pub fn temperature(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_temp = min;
        self.max_temp = max;
        self
    }

    pub fn time(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min_time = min;
        self.max_time = max;
        self
    }

    /// True when no predicate is active and every recipe matches
    pub fn is_unconstrained(&self) -> bool {
        self.query.trim().is_empty()
            && active(&self.section).is_none()
            && active(&self.protein).is_none()
            && active(&self.cooking_method).is_none()
            && self.min_temp.is_none()
            && self.max_temp.is_none()
            && self.min_time.is_none()
            && self.max_time.is_none()
    }

    /// Check a single recipe against every active predicate
    pub fn matches(&self, recipe: &Recipe) -> bool {
        Matcher::new(self).matches(recipe)
    }
}

/// Filter a catalog down to the entries matching `query`.
///
/// The result is the subsequence of `recipes` whose elements satisfy every
/// active predicate, in their original order. An empty catalog yields an
/// empty result.
pub fn filter_recipes<'a>(recipes: &'a [Recipe], query: &SearchQuery) -> Vec<&'a Recipe> {
    let matcher = Matcher::new(query);
    recipes.iter().filter(|r| matcher.matches(r)).collect()
}

/// Query with the text needle lowercased once up front
struct Matcher<'q> {
    needle: Option<String>,
    section: Option<&'q str>,
    protein: Option<&'q str>,
    method: Option<&'q str>,
    temp: Bounds,
    time: Bounds,
}

impl<'q> Matcher<'q> {
    fn new(query: &'q SearchQuery) -> Self {
        let needle = if query.query.trim().is_empty() {
            None
        } else {
            Some(query.query.to_lowercase())
        };

        Self {
            needle,
            section: active(&query.section),
            protein: active(&query.protein),
            method: active(&query.cooking_method),
            temp: Bounds::new(query.min_temp, query.max_temp),
            time: Bounds::new(query.min_time, query.max_time),
        }
    }

    // Predicates run in order: text, section, protein, method, temperature, time
    fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(ref needle) = self.needle {
            if !text_matches(recipe, needle) {
                return false;
            }
        }

        if let Some(section) = self.section {
            if recipe.section != section {
                return false;
            }
        }

        if let Some(protein) = self.protein {
            if recipe.protein != protein {
                return false;
            }
        }

        if let Some(method) = self.method {
            if !recipe.has_method(method) {
                return false;
            }
        }

        self.temp.admits(recipe.temperature) && self.time.admits(recipe.time_hours)
    }
}

/// Title, decoded badge, or plain-text body contains the needle
fn text_matches(recipe: &Recipe, needle: &str) -> bool {
    contains_ignore_case(&recipe.title, needle)
        || recipe
            .display_badge()
            .map(|b| contains_ignore_case(&b, needle))
            .unwrap_or(false)
        || contains_ignore_case(&recipe.plain_text(), needle)
}

#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: Option<f64>,
    max: Option<f64>,
}

impl Bounds {
    fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    fn is_active(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Inactive bounds admit everything; active bounds reject null values
    fn admits(&self, value: Option<f64>) -> bool {
        if !self.is_active() {
            return true;
        }
        let Some(value) = value else {
            return false;
        };
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }
}

fn selector(value: String) -> Option<String> {
    if value.is_empty() || value == ALL {
        None
    } else {
        Some(value)
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty() && *v != ALL)
}
