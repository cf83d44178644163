// ProfLog - core/mod.rs
//
// Core business logic layer.
// Dependencies: util layer and pure-logic crates (regex, chrono, indexmap,
// csv, walkdir for traversal).
// Must NOT depend on: platform or app.

pub mod categorize;
pub mod discovery;
pub mod export;
pub mod filter;
pub mod histogram;
pub mod model;
pub mod parser;
pub mod profile;
pub mod profiling;
pub mod summary;
pub mod template;
pub mod throughput;
pub mod tracker;
