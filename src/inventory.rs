//! Dependency inventory: the (unit, dependency, license) triples to check.
//!
//! ```toml
//! [[dependency]]
//! unit = "app"
//! name = "serde"
//! license = "MIT OR Apache-2.0"
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::Dependency;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Inventory {
    dependency: Vec<Dependency>,
}

/// Parse an inventory document, keeping declaration order.
pub fn parse_inventory(text: &str) -> Result<Vec<Dependency>> {
    let inventory: Inventory = toml::from_str(text)?;
    Ok(inventory.dependency)
}

pub fn load_inventory(path: &Path) -> Result<Vec<Dependency>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dependency inventory {}", path.display()))?;
    parse_inventory(&content)
        .with_context(|| format!("failed to parse dependency inventory {}", path.display()))
}
