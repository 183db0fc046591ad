// Library exports for hijab-gallery
// This allows integration tests and external code to use the crate's modules

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod notify;
pub mod pagination;
pub mod reviews;
pub mod routes;
pub mod state;
pub mod taxonomy;
pub mod validation;
