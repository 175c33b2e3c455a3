//! License expressions, the compatibility graph and the pieces around them.
//!
//! - [`expression`]: SPDX expression AST and parser
//! - [`graph`]: canonical licenses and directed compatibility edges
//! - [`evaluator`]: OR/AND/WITH semantics over a [`CompatibilityCheck`](evaluator::CompatibilityCheck)
//! - [`resolver`]: free-form strings to canonical identifiers
//! - [`classifier`]: one category per expression, for reporting

pub mod classifier;
pub mod evaluator;
pub mod expression;
pub mod graph;
mod lexer;
pub(crate) mod loader;
pub mod resolver;
