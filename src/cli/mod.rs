pub mod app;
pub mod commands;

pub use app::{CatalogKind, Cli, Commands};
