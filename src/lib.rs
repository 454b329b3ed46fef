//
// lib.rs
// seriesnav
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//

// Public surface of the library: the series-assembly and frame-rendering
// pipeline plus the CLI/web glue around it.
pub mod archive;
pub mod cli;
pub mod decode;
pub mod dicom_access;
pub mod frames;
pub mod instance;
pub mod metadata;
pub mod models;
pub mod render;
pub mod series;
pub mod session;
pub mod web;
pub mod window;

pub use cli::{run as run_cli, Cli, Commands};
