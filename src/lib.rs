//! Record how tracks mix into each other, then walk the resulting graph
//! one transition at a time while building a set.

pub mod collection;
pub mod config;
pub mod db;
pub mod export;
pub mod graph;
pub mod import;
pub mod key;
pub mod loader;
pub mod model;
pub mod navigator;
pub mod repository;
pub mod session;
pub mod subset;

/// Application name for XDG paths
pub const APP_NAME: &str = "mixgraph";
