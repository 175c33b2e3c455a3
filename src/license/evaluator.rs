//! Expression-aware compatibility evaluation.
//!
//! Walks an [`ExprNode`] and asks a [`CompatibilityCheck`] about each leaf:
//! - `OR`   → compatible if either side is (the licensee picks a side)
//! - `AND`  → compatible only if both sides are
//! - `WITH` → the base license decides; an exception never adds obligations

use std::collections::BTreeSet;
use std::fmt;

use crate::license::expression::ExprNode;

/// A single dependency license as seen by a compatibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepRef<'a> {
    /// A canonical identifier, optionally with the or-later flag.
    Id { id: &'a str, or_later: bool },
    /// A `LicenseRef-`/`AdditionRef-` identifier. These are never indexed.
    Ref(&'a str),
}

impl<'a> DepRef<'a> {
    /// The leaf of an expression, or `None` for compound nodes.
    pub fn from_leaf(node: &'a ExprNode) -> Option<Self> {
        match node {
            ExprNode::LicenseId { id, or_later } => Some(DepRef::Id {
                id,
                or_later: *or_later,
            }),
            ExprNode::LicenseRef { license_ref, .. } => Some(DepRef::Ref(license_ref)),
            _ => None,
        }
    }

    pub fn id(&self) -> &'a str {
        match self {
            DepRef::Id { id, .. } => *id,
            DepRef::Ref(license_ref) => *license_ref,
        }
    }
}

impl<'a> From<&'a str> for DepRef<'a> {
    fn from(id: &'a str) -> Self {
        DepRef::Id {
            id,
            or_later: false,
        }
    }
}

impl<'a> From<&'a String> for DepRef<'a> {
    fn from(id: &'a String) -> Self {
        DepRef::from(id.as_str())
    }
}

impl fmt::Display for DepRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepRef::Id { id, or_later: true } => write!(f, "{}+", id),
            DepRef::Id { id, .. } => write!(f, "{}", id),
            DepRef::Ref(license_ref) => write!(f, "{}", license_ref),
        }
    }
}

/// Answers whether code under `project_id` may depend on code under `dep`.
///
/// [`LicenseGraph`](crate::license::graph::LicenseGraph) is the production
/// implementation.
pub trait CompatibilityCheck {
    fn is_compatible(&self, project_id: &str, dep: DepRef<'_>) -> bool;
}

/// Whether `expr` may be used by a project licensed under `project_id`.
pub fn is_compatible<C>(expr: &ExprNode, checker: &C, project_id: &str) -> bool
where
    C: CompatibilityCheck + ?Sized,
{
    match expr {
        ExprNode::LicenseId { .. } | ExprNode::LicenseRef { .. } => match DepRef::from_leaf(expr) {
            Some(dep) => checker.is_compatible(project_id, dep),
            None => false,
        },
        ExprNode::With { license, .. } => is_compatible(license, checker, project_id),
        ExprNode::Or { left, right } => {
            is_compatible(left, checker, project_id) || is_compatible(right, checker, project_id)
        }
        ExprNode::And { left, right } => {
            is_compatible(left, checker, project_id) && is_compatible(right, checker, project_id)
        }
    }
}

/// Leaf identifiers responsible for `expr` being incompatible.
///
/// Empty when the expression is compatible. A failing `OR` blames both
/// sides; a failing `AND` blames only the sides that fail.
pub fn offending_ids<C>(expr: &ExprNode, checker: &C, project_id: &str) -> BTreeSet<String>
where
    C: CompatibilityCheck + ?Sized,
{
    let mut ids = BTreeSet::new();
    collect_offending(expr, checker, project_id, &mut ids);
    ids
}

fn collect_offending<C>(expr: &ExprNode, checker: &C, project_id: &str, ids: &mut BTreeSet<String>)
where
    C: CompatibilityCheck + ?Sized,
{
    if is_compatible(expr, checker, project_id) {
        return;
    }
    match expr {
        ExprNode::LicenseId { .. } | ExprNode::LicenseRef { .. } => {
            ids.insert(expr.to_string());
        }
        ExprNode::With { license, .. } => collect_offending(license, checker, project_id, ids),
        ExprNode::Or { left, right } | ExprNode::And { left, right } => {
            collect_offending(left, checker, project_id, ids);
            collect_offending(right, checker, project_id, ids);
        }
    }
}
