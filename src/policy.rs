//! Two-phase license policy check.
//!
//! 1. Deny check: every leaf license of every non-exempt dependency is looked
//!    up in the effective deny list of that dependency. Any hit fails the run
//!    and the compatibility check is skipped.
//! 2. Compatibility check: allow-listed licenses pass as-is, everything else
//!    is evaluated against the project license through the graph.
//!
//! Per-dependency problems never abort a run; each one ends up as a
//! [`Status`] in the [`Report`].

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::license::classifier::classify;
use crate::license::evaluator;
use crate::license::expression::{parse, ExprNode};
use crate::license::graph::{Category, LicenseGraph};
use crate::license::resolver::{AliasResolver, Resolve};
use crate::models::{Dependency, DependencyVerdict, Report, Status};

pub struct PolicyChecker<R = AliasResolver> {
    graph: Arc<LicenseGraph>,
    policy: PolicyConfig,
    resolver: R,
}

/// A dependency that made it past the exemption and no-license filters.
struct Candidate<'d> {
    dep: &'d Dependency,
    /// Declared or overriding license text, trimmed.
    text: String,
    /// Canonicalized expression, or the resolved id when `text` did not parse.
    expr: Option<ExprNode>,
    overridden: bool,
}

impl Candidate<'_> {
    fn effective_license(&self) -> String {
        match &self.expr {
            Some(expr) => expr.to_string(),
            None => self.text.clone(),
        }
    }

    /// Leaf ids seen by the deny check. Never empty.
    fn leaf_ids(&self) -> BTreeSet<String> {
        match &self.expr {
            Some(expr) => expr.license_ids(),
            None => BTreeSet::from([self.text.clone()]),
        }
    }
}

impl PolicyChecker<AliasResolver> {
    pub fn new(graph: Arc<LicenseGraph>, policy: &PolicyConfig) -> Self {
        let resolver = AliasResolver::new(&graph);
        Self::with_resolver(graph, policy, resolver)
    }
}

impl<R: Resolve> PolicyChecker<R> {
    /// License ids in `policy` are canonicalized through `resolver` so they
    /// compare equal to canonicalized expression leaves.
    pub fn with_resolver(graph: Arc<LicenseGraph>, policy: &PolicyConfig, resolver: R) -> Self {
        let policy = policy.canonicalize(|id| canonical_policy_id(&resolver, &graph, id));
        Self {
            graph,
            policy,
            resolver,
        }
    }

    pub fn graph(&self) -> &LicenseGraph {
        &self.graph
    }

    /// Canonical id for a project license string.
    pub fn resolve(&self, raw: &str) -> Option<String> {
        self.resolver.resolve(raw)
    }

    pub fn check(&self, project_id: &str, deps: &[Dependency]) -> Report {
        if !self.graph.known(project_id) {
            warn!(project = project_id, "project license is not in the license graph");
        }

        let mut verdicts: Vec<Option<DependencyVerdict>> = vec![None; deps.len()];
        let mut candidates = Vec::new();
        for (index, dep) in deps.iter().enumerate() {
            match self.prepare(dep) {
                Ok(candidate) => candidates.push((index, candidate)),
                Err(verdict) => verdicts[index] = Some(verdict),
            }
        }

        // Phase 1
        let mut denied = 0;
        for (index, candidate) in &candidates {
            if let Some(verdict) = self.deny_check(candidate) {
                denied += 1;
                verdicts[*index] = Some(verdict);
            }
        }
        info!(
            checked = candidates.len(),
            denied, "deny check finished"
        );

        // Phase 2
        let compatibility_skipped = denied > 0;
        let mut unchecked = 0;
        if compatibility_skipped {
            unchecked = candidates.len() - denied;
            info!(unchecked, "skipping compatibility check after denials");
        } else {
            for (index, candidate) in &candidates {
                verdicts[*index] = Some(self.compatibility_check(project_id, candidate));
            }
            info!(
                project = project_id,
                checked = candidates.len(),
                "compatibility check finished"
            );
        }

        let mut report = Report {
            project_license: project_id.to_string(),
            compatibility_skipped,
            unchecked,
            ..Report::default()
        };
        for (dep, verdict) in deps.iter().zip(verdicts) {
            if let Some(verdict) = verdict {
                report.push(&dep.unit, verdict);
            }
        }
        report
    }

    fn prepare<'d>(&self, dep: &'d Dependency) -> Result<Candidate<'d>, DependencyVerdict> {
        if self.policy.exempt_packages.contains(&dep.name) {
            debug!(package = %dep.name, "exempt");
            return Err(DependencyVerdict {
                name: dep.name.clone(),
                license: dep.license.clone(),
                status: Status::Exempt,
                reason: "package is exempt from license policy".to_string(),
                offending: Vec::new(),
                category: None,
            });
        }

        let override_license = self.policy.license_overrides.get(&dep.name);
        let overridden = override_license.is_some();
        let text = override_license
            .or(dep.license.as_ref())
            .map(|s| s.trim())
            .unwrap_or("");

        if text.is_empty() {
            debug!(package = %dep.name, "no license declared");
            return Err(DependencyVerdict {
                name: dep.name.clone(),
                license: None,
                status: Status::NoLicense,
                reason: "no license declared".to_string(),
                offending: Vec::new(),
                category: None,
            });
        }

        let expr = match parse(text) {
            Ok(expr) => Some(expr.map_leaves(&|id: &str, or_later: bool| {
                canonical_leaf(&self.resolver, &self.graph, id, or_later)
            })),
            Err(e) => {
                let resolved = self.resolver.resolve(text);
                warn!(
                    package = %dep.name,
                    license = text,
                    error = %e.detail,
                    resolved = resolved.as_deref().unwrap_or("-"),
                    "license is not a valid expression, falling back to resolver"
                );
                resolved.map(ExprNode::license_id)
            }
        };

        Ok(Candidate {
            dep,
            text: text.to_string(),
            expr,
            overridden,
        })
    }

    fn deny_check(&self, candidate: &Candidate<'_>) -> Option<DependencyVerdict> {
        let deny = self.policy.effective_deny(&candidate.dep.name);
        if deny.is_empty() {
            return None;
        }

        let blocked: Vec<String> = candidate
            .leaf_ids()
            .into_iter()
            .filter(|id| deny.contains(id.as_str()))
            .collect();
        if blocked.is_empty() {
            return None;
        }

        debug!(package = %candidate.dep.name, blocked = ?blocked, "denied");
        Some(DependencyVerdict {
            name: candidate.dep.name.clone(),
            license: Some(candidate.effective_license()),
            status: Status::Denied,
            reason: format!("denied by policy: {}", blocked.join(", ")),
            offending: blocked,
            category: self.category(candidate),
        })
    }

    fn compatibility_check(&self, project_id: &str, candidate: &Candidate<'_>) -> DependencyVerdict {
        let (status, reason, offending) = self.decide(project_id, candidate);
        debug!(package = %candidate.dep.name, %status, "compatibility decided");
        DependencyVerdict {
            name: candidate.dep.name.clone(),
            license: Some(candidate.effective_license()),
            status,
            reason,
            offending,
            category: self.category(candidate),
        }
    }

    fn decide(&self, project_id: &str, candidate: &Candidate<'_>) -> (Status, String, Vec<String>) {
        let pass = |status: Status, reason: String| {
            if candidate.overridden {
                (Status::Overridden, format!("{} (license override)", reason), Vec::new())
            } else {
                (status, reason, Vec::new())
            }
        };

        if let Some(id) = self.single_id(candidate) {
            if self.policy.allow_licenses.contains(&id) {
                return pass(Status::Allowed, format!("{} is allow-listed", id));
            }
        }

        let Some(expr) = &candidate.expr else {
            return (
                Status::Unresolved,
                format!("'{}' is neither a valid expression nor a known license", candidate.text),
                Vec::new(),
            );
        };

        if evaluator::is_compatible(expr, &*self.graph, project_id) {
            return pass(Status::Ok, format!("compatible with {}", project_id));
        }

        let ids = expr.license_ids();
        if !ids.iter().any(|id| self.graph.known(id)) {
            return (
                Status::Unresolved,
                format!("no known license in '{}'", expr),
                ids.into_iter().collect(),
            );
        }

        let offending: Vec<String> =
            evaluator::offending_ids(expr, &*self.graph, project_id)
                .into_iter()
                .collect();
        (
            Status::Incompatible,
            format!("{} cannot depend on {}", project_id, offending.join(", ")),
            offending,
        )
    }

    /// The one canonical id a dependency's license stands for, if any.
    fn single_id(&self, candidate: &Candidate<'_>) -> Option<String> {
        match &candidate.expr {
            Some(ExprNode::LicenseId {
                id,
                or_later: false,
            }) => Some(id.clone()),
            _ => self.resolver.resolve(&candidate.text),
        }
    }

    fn category(&self, candidate: &Candidate<'_>) -> Option<Category> {
        candidate
            .expr
            .as_ref()
            .and_then(|expr| classify(expr, &self.graph))
    }
}

fn canonical_id<R: Resolve>(resolver: &R, id: &str) -> String {
    resolver.resolve(id).unwrap_or_else(|| id.to_string())
}

/// Canonical form of an expression leaf.
///
/// `X+` becomes the spelled-out or-later license when one exists, so
/// `GPL-2.0+`, `GPL-2.0-only+` and `GPL-2.0-or-later` are the same leaf.
fn canonical_leaf<R: Resolve>(
    resolver: &R,
    graph: &LicenseGraph,
    id: &str,
    or_later: bool,
) -> (String, bool) {
    if or_later {
        if let Some(later) = or_later_id(resolver, graph, id) {
            return (later, false);
        }
    }
    (canonical_id(resolver, id), or_later)
}

fn or_later_id<R: Resolve>(resolver: &R, graph: &LicenseGraph, id: &str) -> Option<String> {
    if let Some(later) = resolver.resolve(&format!("{}+", id)) {
        return Some(later);
    }
    let base = resolver.resolve(id)?;
    let later = format!("{}-or-later", base.strip_suffix("-only")?);
    graph.known(&later).then_some(later)
}

/// Policy entries go through the same leaf rules as expressions.
fn canonical_policy_id<R: Resolve>(resolver: &R, graph: &LicenseGraph, id: &str) -> String {
    if let Some(later) = resolver.resolve(id) {
        return later;
    }
    match id.trim().strip_suffix('+') {
        Some(base) => match canonical_leaf(resolver, graph, base.trim_end(), true) {
            (id, true) => format!("{}+", id),
            (id, false) => id,
        },
        None => id.to_string(),
    }
}
