use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::license::graph::Category;

/// One dependency of one owning unit (crate, package, module...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dependency {
    pub unit: String,
    pub name: String,
    /// Raw license string as declared; anything from an SPDX expression to
    /// a trove classifier.
    #[serde(default)]
    pub license: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Incompatible,
    Denied,
    Unresolved,
    Exempt,
    Allowed,
    Overridden,
    NoLicense,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Denied,
        Status::Incompatible,
        Status::Unresolved,
        Status::NoLicense,
        Status::Exempt,
        Status::Allowed,
        Status::Overridden,
        Status::Ok,
    ];

    /// Whether this status fails the run.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Status::Incompatible | Status::Denied | Status::Unresolved
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::Incompatible => write!(f, "incompatible"),
            Status::Denied => write!(f, "denied"),
            Status::Unresolved => write!(f, "unresolved"),
            Status::Exempt => write!(f, "exempt"),
            Status::Allowed => write!(f, "allowed"),
            Status::Overridden => write!(f, "overridden"),
            Status::NoLicense => write!(f, "no_license"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyVerdict {
    pub name: String,
    /// License the decision was based on, after overrides and canonicalization.
    pub license: Option<String>,
    pub status: Status,
    pub reason: String,
    /// Identifiers that caused a denial or an incompatibility.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub offending: Vec<String>,
    pub category: Option<Category>,
}

/// Outcome of a policy run: verdicts grouped by owning unit.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub project_license: String,
    pub units: BTreeMap<String, Vec<DependencyVerdict>>,
    /// A denial was found, so no compatibility check ran.
    pub compatibility_skipped: bool,
    /// Dependencies left without a verdict because compatibility was skipped.
    pub unchecked: usize,
}

impl Report {
    pub fn passed(&self) -> bool {
        !self.verdicts().any(|(_, v)| v.status.is_failure())
    }

    /// Every verdict with its owning unit, units in sorted order.
    pub fn verdicts(&self) -> impl Iterator<Item = (&str, &DependencyVerdict)> {
        self.units
            .iter()
            .flat_map(|(unit, verdicts)| verdicts.iter().map(move |v| (unit.as_str(), v)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &DependencyVerdict)> {
        self.verdicts().filter(|(_, v)| v.status.is_failure())
    }

    pub fn count(&self, status: Status) -> usize {
        self.verdicts().filter(|(_, v)| v.status == status).count()
    }

    pub fn total(&self) -> usize {
        self.units.values().map(Vec::len).sum()
    }

    pub(crate) fn push(&mut self, unit: &str, verdict: DependencyVerdict) {
        self.units.entry(unit.to_string()).or_default().push(verdict);
    }
}
