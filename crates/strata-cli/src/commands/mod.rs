//! Subcommand implementations.

pub mod cubes;
pub mod health;
pub mod query;
pub mod refresh;
pub mod registry;
