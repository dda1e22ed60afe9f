//! Pomodoro register reporter CLI library.
//!
//! This crate provides the CLI interface over `pf-core`.

mod cli;
pub mod commands;
mod config;

pub use cli::Cli;
pub use config::Config;
