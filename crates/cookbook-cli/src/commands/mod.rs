//! Command implementations.

pub mod offline;
pub mod recipes;
