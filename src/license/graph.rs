//! Directed license compatibility graph.
//!
//! Nodes are canonical SPDX identifiers with their metadata; an edge
//! `from → to` means code under `from` may depend on code under `to`.
//! A graph only exists once every table has been loaded and validated (see
//! [`loader`](crate::license::loader)); it exposes no mutation afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LicenseDataError;
use crate::license::evaluator::{CompatibilityCheck, DepRef};
use crate::license::loader;

const BUILTIN_LICENSES: &str = include_str!("../../data/licenses.toml");
const BUILTIN_RULES: &str = include_str!("../../data/compat.toml");

static BUILTIN: OnceLock<Result<Arc<LicenseGraph>, LicenseDataError>> = OnceLock::new();

/// Override graphs keyed by the user table text.
static OVERRIDES: OnceLock<Mutex<HashMap<String, Arc<LicenseGraph>>>> = OnceLock::new();

/// Broad license family used for reporting and policy summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Permissive,
    WeakCopyleft,
    StrongCopyleft,
    NetworkCopyleft,
    SourceAvailable,
    Proprietary,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Permissive,
        Category::WeakCopyleft,
        Category::StrongCopyleft,
        Category::NetworkCopyleft,
        Category::SourceAvailable,
        Category::Proprietary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Permissive => "permissive",
            Category::WeakCopyleft => "weak-copyleft",
            Category::StrongCopyleft => "strong-copyleft",
            Category::NetworkCopyleft => "network-copyleft",
            Category::SourceAvailable => "source-available",
            Category::Proprietary => "proprietary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Category::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Google license classifier buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleCategory {
    Restricted,
    Reciprocal,
    Notice,
    Permissive,
    Unencumbered,
    ByExceptionOnly,
    Forbidden,
}

impl GoogleCategory {
    pub const ALL: [GoogleCategory; 7] = [
        GoogleCategory::Restricted,
        GoogleCategory::Reciprocal,
        GoogleCategory::Notice,
        GoogleCategory::Permissive,
        GoogleCategory::Unencumbered,
        GoogleCategory::ByExceptionOnly,
        GoogleCategory::Forbidden,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GoogleCategory::Restricted => "restricted",
            GoogleCategory::Reciprocal => "reciprocal",
            GoogleCategory::Notice => "notice",
            GoogleCategory::Permissive => "permissive",
            GoogleCategory::Unencumbered => "unencumbered",
            GoogleCategory::ByExceptionOnly => "by_exception_only",
            GoogleCategory::Forbidden => "forbidden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        GoogleCategory::ALL.into_iter().find(|c| c.as_str() == value)
    }
}

/// Metadata for one canonical license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LicenseInfo {
    pub spdx_id: String,
    pub name: String,
    pub category: Category,
    pub osi_approved: bool,
    pub aliases: Vec<String>,
    pub google_category: Option<GoogleCategory>,
    /// This license followed by its later versions, most specific first.
    pub or_later_chain: Vec<String>,
    pub patent_grant: bool,
    pub patent_retaliation: bool,
}

/// Outcome of a single compatibility query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Compatibility {
    Compatible,
    /// Both licenses are known but no rule allows the combination.
    Incompatible,
    /// The project license is not a node of the graph.
    UnknownProject,
    /// The dependency license is not a node of the graph.
    UnknownLicense,
    /// `LicenseRef-`/`AdditionRef-` identifiers are never indexed.
    Unindexed,
}

#[derive(Debug, Clone, Default)]
pub struct LicenseGraph {
    pub(crate) nodes: BTreeMap<String, LicenseInfo>,
    pub(crate) edges: BTreeMap<String, BTreeSet<String>>,
}

impl LicenseGraph {
    /// The graph built from the bundled tables.
    ///
    /// Built on first use and shared by every caller of the process.
    pub fn builtin() -> Result<Arc<LicenseGraph>, LicenseDataError> {
        BUILTIN
            .get_or_init(|| {
                debug!("building bundled license graph");
                loader::load(BUILTIN_LICENSES, BUILTIN_RULES, None).map(Arc::new)
            })
            .clone()
    }

    /// The bundled tables plus a user override table.
    ///
    /// Built once per distinct table and never shared with
    /// [`LicenseGraph::builtin`]. Invalid tables are not cached.
    pub fn with_overrides(user_table: &str) -> Result<Arc<LicenseGraph>, LicenseDataError> {
        let cache = OVERRIDES.get_or_init(|| Mutex::new(HashMap::new()));
        let mut cache = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(graph) = cache.get(user_table) {
            return Ok(Arc::clone(graph));
        }

        debug!("building license graph with user overrides");
        let graph = Arc::new(loader::load(BUILTIN_LICENSES, BUILTIN_RULES, Some(user_table))?);
        cache.insert(user_table.to_string(), Arc::clone(&graph));
        Ok(graph)
    }

    /// Load a graph from arbitrary tables.
    pub fn load(
        licenses: &str,
        rules: &str,
        user_table: Option<&str>,
    ) -> Result<LicenseGraph, LicenseDataError> {
        loader::load(licenses, rules, user_table)
    }

    pub fn known(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn info(&self, id: &str) -> Option<&LicenseInfo> {
        self.nodes.get(id)
    }

    /// Canonical identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Category name of `id`, `"unknown"` when the license is not in the graph.
    pub fn category(&self, id: &str) -> &'static str {
        self.nodes
            .get(id)
            .map(|info| info.category.as_str())
            .unwrap_or("unknown")
    }

    /// Google classifier bucket of `id`, empty when missing or unset.
    pub fn google_category(&self, id: &str) -> &'static str {
        self.nodes
            .get(id)
            .and_then(|info| info.google_category)
            .map(|c| c.as_str())
            .unwrap_or("")
    }

    /// Licenses that code under `project_id` may depend on.
    pub fn compatible_with(&self, project_id: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(project_id)
            .into_iter()
            .flat_map(|targets| targets.iter().map(String::as_str))
    }

    /// Detailed compatibility verdict for a single dependency license.
    pub fn check<'a>(&self, project_id: &str, dep: impl Into<DepRef<'a>>) -> Compatibility {
        if !self.known(project_id) {
            return Compatibility::UnknownProject;
        }

        let (id, or_later) = match dep.into() {
            DepRef::Ref(_) => return Compatibility::Unindexed,
            DepRef::Id { id, or_later } => (id, or_later),
        };

        let allowed = match self.edges.get(project_id) {
            Some(allowed) => allowed,
            None => return self.unknown_or_incompatible(id),
        };

        if allowed.contains(id) {
            return Compatibility::Compatible;
        }

        if or_later {
            if let Some(info) = self.nodes.get(id) {
                if info.or_later_chain.iter().any(|later| allowed.contains(later)) {
                    return Compatibility::Compatible;
                }
            }
        }

        self.unknown_or_incompatible(id)
    }

    fn unknown_or_incompatible(&self, id: &str) -> Compatibility {
        if self.known(id) {
            Compatibility::Incompatible
        } else {
            Compatibility::UnknownLicense
        }
    }

    pub fn is_compatible<'a>(&self, project_id: &str, dep: impl Into<DepRef<'a>>) -> bool {
        self.check(project_id, dep) == Compatibility::Compatible
    }

    /// The subset of `deps` that `project_id` may not depend on, in input order.
    pub fn incompatible_deps<'a, I>(&self, project_id: &str, deps: I) -> Vec<DepRef<'a>>
    where
        I: IntoIterator,
        I::Item: Into<DepRef<'a>>,
    {
        deps.into_iter()
            .map(Into::into)
            .filter(|dep| !self.is_compatible(project_id, *dep))
            .collect()
    }

    pub fn patent_grant_licenses(&self) -> BTreeSet<&str> {
        self.nodes
            .values()
            .filter(|info| info.patent_grant)
            .map(|info| info.spdx_id.as_str())
            .collect()
    }

    pub fn patent_retaliation_licenses(&self) -> BTreeSet<&str> {
        self.nodes
            .values()
            .filter(|info| info.patent_retaliation)
            .map(|info| info.spdx_id.as_str())
            .collect()
    }

    /// Lowercased alias → canonical id, including every id as its own alias.
    pub fn all_aliases(&self) -> HashMap<String, String> {
        let mut aliases = HashMap::new();
        for info in self.nodes.values() {
            aliases.insert(info.spdx_id.to_lowercase(), info.spdx_id.clone());
            for alias in &info.aliases {
                aliases.insert(alias.to_lowercase(), info.spdx_id.clone());
            }
        }
        aliases
    }
}

impl CompatibilityCheck for LicenseGraph {
    fn is_compatible(&self, project_id: &str, dep: DepRef<'_>) -> bool {
        self.check(project_id, dep) == Compatibility::Compatible
    }
}
