//! Cookbook core library.
//!
//! Recipe catalog loading, the search/filter engine behind the recipe
//! browser, and the offline cache manager that keeps the app shell and
//! catalog available without a network connection.

pub mod catalog;
pub mod config;
pub mod models;
pub mod offline;
pub mod search;
pub mod utils;

pub use catalog::{Catalog, CatalogClient, CatalogError, CatalogSource};
pub use config::Config;
pub use models::{ContentType, Recipe};
pub use search::{filter_recipes, SearchQuery};
