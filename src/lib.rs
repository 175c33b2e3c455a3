//! License compatibility engine.
//!
//! Decides, for a project with a declared license, whether each dependency's
//! license (possibly a compound SPDX expression) may be combined with it under
//! an organizational deny/allow policy.
//!
//! - [`license::expression`] parses SPDX expressions
//! - [`license::graph`] holds canonical licenses and compatibility edges
//! - [`license::evaluator`] applies OR/AND/WITH semantics against the graph
//! - [`policy`] runs the deny check and the compatibility check

pub mod config;
pub mod error;
pub mod inventory;
pub mod license;
pub mod models;
pub mod policy;
pub mod report;

pub use error::{LicenseDataError, ParseError};
pub use license::evaluator::{is_compatible, CompatibilityCheck, DepRef};
pub use license::expression::{license_ids, parse, ExprNode};
pub use license::graph::{Category, Compatibility, LicenseGraph, LicenseInfo};
pub use models::{Dependency, DependencyVerdict, Report, Status};
pub use policy::PolicyChecker;
