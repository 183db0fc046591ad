pub mod domain;
pub mod repository;
pub mod service;

pub use domain::{
    CatalogError, FilterOptions, Instruction, RequiredItem, Style, StyleDraft, StyleFilter,
    StylePatch, StyleSort, StyleSuggestion,
};
pub use repository::{SqliteStyleRepository, StyleRepository};
pub use service::CatalogManager;
