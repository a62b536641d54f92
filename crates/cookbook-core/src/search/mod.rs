//! Recipe search and filtering.
//!
//! `filter_recipes` is a pure function over the loaded catalog: it returns
//! the entries matching every active predicate of a `SearchQuery`, in
//! catalog order. Callers re-run it whenever the query changes; there is no
//! caching inside the engine.
//!
//! The `facets` module derives the sidebar data (table of contents,
//! category counts, method lists) from the same catalog.

pub mod facets;
pub mod query;

pub use facets::{
    category_counts, cooking_methods, result_summary, table_of_contents, ProteinSummary,
    SectionSummary, TEMPERATURE_SLIDER, TIME_SLIDER,
};
pub use query::{filter_recipes, SearchQuery, ALL};
