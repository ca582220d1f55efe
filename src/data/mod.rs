//! Data access: SQLite store, dataset building and web scrapers

pub mod database;
pub mod dataset;
pub mod scrapers;

pub use database::Database;
pub use dataset::{BuildReport, Dataset, DatasetBuilder};
