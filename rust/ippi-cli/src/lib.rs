//! Shared pieces of the `ippi` command-line tool.

pub mod colors;
pub mod config;
pub mod runner;
