//! `slim` command-line front end.
//!
//! Loads a transcript into an in-memory host tree and drives the window,
//! scheduler and export crates over it.

pub mod cli;
mod commands;
mod simulate;

pub use commands::run;
