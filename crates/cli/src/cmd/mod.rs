//! CLI command implementations

pub mod compare;
pub mod config;
pub mod dump;
pub mod history;
pub mod run;
