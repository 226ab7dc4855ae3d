pub mod catalog;
pub mod cli;
pub mod config;
pub mod config_set;
pub mod error;
pub mod instantiate;
pub mod io;
pub mod naming;
pub mod rewrite;

pub use error::{Result, TuneconfError};
