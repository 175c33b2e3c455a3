//! Report renderers for policy check results.
//!
//! - [`terminal`]: colored, tabular output with summary box; respects `--verbose` / `--quiet`.
//! - [`json`]: the full verdict tree for machine consumption.

pub mod json;
pub mod terminal;
