//! Utility functions for text cleanup and formatting.

pub mod text;

// Re-export commonly used functions at module level
pub use text::{contains_ignore_case, decode_html_entities, strip_html_tags, title_case, truncate_text};
