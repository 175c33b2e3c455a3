//! Maps free-form license strings to canonical SPDX identifiers.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::license::graph::LicenseGraph;

/// Resolves a raw license string to a canonical identifier.
pub trait Resolve {
    fn resolve(&self, raw: &str) -> Option<String>;
}

/// Alias-table resolver backed by [`LicenseGraph::all_aliases`].
///
/// Tries, in order:
/// - a case-insensitive alias match (`mit`, `GPLv2`, `Apache Software License`)
/// - a normalized form with collapsed whitespace, no leading `the ` and no
///   trailing ` license`
/// - both of the above on the last segment of a trove classifier
///   (`License :: OSI Approved :: MIT License` → `MIT License`)
#[derive(Debug, Clone)]
pub struct AliasResolver {
    aliases: HashMap<String, String>,
}

impl AliasResolver {
    pub fn new(graph: &LicenseGraph) -> Self {
        Self {
            aliases: graph.all_aliases(),
        }
    }

    fn lookup(&self, raw: &str) -> Option<String> {
        let lower = raw.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if let Some(id) = self.aliases.get(&lower) {
            return Some(id.clone());
        }
        self.aliases.get(&normalize(&lower)).cloned()
    }
}

impl Resolve for AliasResolver {
    fn resolve(&self, raw: &str) -> Option<String> {
        if let Some(id) = self.lookup(raw) {
            return Some(id);
        }
        let segment = raw.rsplit("::").next()?;
        if segment.len() == raw.len() {
            return None;
        }
        self.lookup(segment)
    }
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

/// Expects lowercase input.
fn normalize(lower: &str) -> String {
    let collapsed = whitespace().replace_all(lower.trim(), " ");
    let mut s = collapsed.as_ref();
    s = s.strip_prefix("the ").unwrap_or(s);
    s = s.strip_suffix(" license").unwrap_or(s);
    s.trim().to_string()
}
