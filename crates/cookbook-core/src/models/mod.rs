//! Data models for catalog entries.
//!
//! - `Recipe`: one catalog entry (recipe or reference material)
//! - `ContentType`: discriminator between recipes and operational guidance

pub mod recipe;

pub use recipe::{ContentType, Recipe, NO_PROTEIN};
