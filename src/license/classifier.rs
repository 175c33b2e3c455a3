use crate::license::expression::ExprNode;
use crate::license::graph::{Category, LicenseGraph};

/// Summarize an expression as a single license category.
///
/// - `OR`   → the most permissive side wins
/// - `AND`  → the most restrictive side wins, unknown if either side is
/// - `WITH` → the base license decides
///
/// Returns `None` when no leaf of the expression is in the graph.
pub fn classify(expr: &ExprNode, graph: &LicenseGraph) -> Option<Category> {
    match expr {
        ExprNode::LicenseId { id, .. } => graph.info(id).map(|info| info.category),
        ExprNode::LicenseRef { .. } => None,
        ExprNode::With { license, .. } => classify(license, graph),
        ExprNode::Or { left, right } => {
            most_permissive(classify(left, graph), classify(right, graph))
        }
        ExprNode::And { left, right } => {
            most_restrictive(classify(left, graph), classify(right, graph))
        }
    }
}

fn most_permissive(a: Option<Category>, b: Option<Category>) -> Option<Category> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// An unknown side could be anything, so it hides the known one.
fn most_restrictive(a: Option<Category>, b: Option<Category>) -> Option<Category> {
    Some(a?.max(b?))
}
