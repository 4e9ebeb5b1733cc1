//! Export module for inspecting object graphs in external tools.
//!
//! - **JSON**: relations cache as a nodes/links document (D3.js-compatible),
//!   and unused-analysis reports

pub mod json;

pub use json::{export_relations_json, export_unused_json};
