// ProfLog - app/mod.rs
//
// Application layer: configuration assembly, the multi-file line source and
// the analysis run.
// Dependencies: core layer, platform (file access, config files).

pub mod analysis;
pub mod line_reader;
pub mod profile_mgr;
