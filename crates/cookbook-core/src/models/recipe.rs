use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::utils::{decode_html_entities, strip_html_tags, truncate_text};

/// Protein key used for entries that have no meaningful protein
pub const NO_PROTEIN: &str = "other";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    #[default]
    Recipe,
    Operational,
    Reference,
    Other(String),
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "recipe" => ContentType::Recipe,
            "operational" => ContentType::Operational,
            "reference" => ContentType::Reference,
            _ => ContentType::Other(value),
        }
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.as_str().to_string()
    }
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Recipe => "recipe",
            ContentType::Operational => "operational",
            ContentType::Reference => "reference",
            ContentType::Other(s) => s,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single catalog entry.
///
/// Records are built once at catalog build time and never mutated at
/// runtime. Nullable metrics (`temperature`, `time_hours`) are `None` for
/// entries where they don't apply, such as operational guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Recipe {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub badge: Option<String>,
    pub section: String,
    pub section_name: String,
    pub protein: String,
    pub protein_name: String,
    #[serde(default)]
    pub cooking_methods: Vec<String>,
    #[serde(default)]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub content_type: ContentType,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub time_hours: Option<f64>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_text: Option<String>,
    // Precomputed by the catalog build; search does not rely on it
    #[serde(rename = "searchText", default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
}

impl Recipe {
    pub fn is_recipe(&self) -> bool {
        self.content_type == ContentType::Recipe
    }

    pub fn has_protein(&self) -> bool {
        !self.protein.is_empty() && self.protein != NO_PROTEIN
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.cooking_methods.iter().any(|m| m == method)
    }

    /// Badge with HTML entities decoded, if the entry has a non-empty badge
    pub fn display_badge(&self) -> Option<String> {
        self.badge
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .map(decode_html_entities)
    }

    /// Plain-text body.
    /// Prefers the precomputed `content_text`, falling back to the markup
    /// with tags stripped.
    pub fn plain_text(&self) -> Cow<'_, str> {
        match self.content_text.as_deref() {
            Some(text) if !text.trim().is_empty() => Cow::Borrowed(text),
            _ => Cow::Owned(decode_html_entities(&strip_html_tags(&self.content))),
        }
    }

    /// Short body preview for result listings
    pub fn preview(&self, max_len: usize) -> String {
        truncate_text(self.plain_text().trim(), max_len)
    }

    /// Temperature label like `165°F`; only shown for actual recipes
    pub fn temperature_display(&self) -> Option<String> {
        if !self.is_recipe() {
            return None;
        }
        self.temperature.map(|t| format!("{}°F", format_number(t)))
    }

    /// Cook time label like `24h`; only shown for actual recipes
    pub fn time_display(&self) -> Option<String> {
        if !self.is_recipe() {
            return None;
        }
        self.time_hours.map(|h| format!("{}h", format_number(h)))
    }

    /// Protein label, hidden for the "other" sentinel and non-recipes
    pub fn protein_display(&self) -> Option<&str> {
        if self.is_recipe() && self.has_protein() {
            Some(&self.protein_name)
        } else {
            None
        }
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
