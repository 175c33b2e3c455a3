//! Builds a [`LicenseGraph`] from TOML tables.
//!
//! Three sources are read in order: the license registry, the rule list and
//! an optional user override table. Every structural defect is collected into
//! a single [`LicenseDataError`]; a graph is returned only when none was found.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use toml::{Table, Value};
use tracing::debug;

use crate::error::LicenseDataError;
use crate::license::graph::{Category, GoogleCategory, LicenseGraph, LicenseInfo};

const LICENSE_FIELDS: &[&str] = &[
    "name",
    "category",
    "osi_approved",
    "aliases",
    "google_category",
    "or_later_chain",
    "patent_grant",
    "patent_retaliation",
];

/// Fields of one `[licenses."<id>"]` entry. `None` means "not given".
#[derive(Debug, Default)]
struct LicensePatch {
    name: Option<String>,
    category: Option<Category>,
    osi_approved: Option<bool>,
    aliases: Option<Vec<String>>,
    google_category: Option<Option<GoogleCategory>>,
    or_later_chain: Option<Vec<String>>,
    patent_grant: Option<bool>,
    patent_retaliation: Option<bool>,
    has_name: bool,
    has_category: bool,
}

#[derive(Default)]
struct Loader {
    nodes: BTreeMap<String, LicenseInfo>,
    edges: BTreeMap<String, BTreeSet<String>>,
    errors: Vec<String>,
}

pub(crate) fn load(
    licenses: &str,
    rules: &str,
    user_table: Option<&str>,
) -> Result<LicenseGraph, LicenseDataError> {
    let mut loader = Loader::default();

    if let Some(table) = loader.parse_source("builtin licenses", licenses, &["licenses"]) {
        loader.read_licenses("builtin licenses", &table, false);
    }
    if let Some(table) = loader.parse_source("builtin rules", rules, &["rule"]) {
        loader.read_rules("builtin rules", &table);
    }
    if let Some(text) = user_table {
        if let Some(table) = loader.parse_source("user table", text, &["licenses", "rule"]) {
            loader.read_licenses("user table", &table, true);
            loader.read_rules("user table", &table);
        }
    }

    loader.finish()
}

impl Loader {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    fn parse_source(&mut self, source: &str, text: &str, sections: &[&str]) -> Option<Table> {
        let table = match text.parse::<Table>() {
            Ok(table) => table,
            Err(e) => {
                self.error(format!("{}: {}", source, e.message()));
                return None;
            }
        };
        for key in table.keys() {
            if !sections.contains(&key.as_str()) {
                self.error(format!("{}: unknown section '{}'", source, key));
            }
        }
        Some(table)
    }

    fn read_licenses(&mut self, source: &str, table: &Table, merge: bool) {
        let entries = match table.get("licenses") {
            None => return,
            Some(Value::Table(entries)) => entries,
            Some(_) => {
                self.error(format!("{}: 'licenses' must be a table", source));
                return;
            }
        };

        for (id, value) in entries {
            let Some(patch) = self.read_patch(source, id, value) else {
                continue;
            };
            if merge {
                if let Some(existing) = self.nodes.get_mut(id) {
                    apply_patch(existing, patch);
                    continue;
                }
            }
            self.insert_new(source, id, patch);
        }
    }

    fn insert_new(&mut self, source: &str, id: &str, patch: LicensePatch) {
        let (name, category) = match (patch.name.clone(), patch.category) {
            (Some(name), Some(category)) => (name, category),
            (name, category) => {
                if name.is_none() && !patch.has_name {
                    self.error(format!("{}: license '{}' is missing 'name'", source, id));
                }
                if category.is_none() && !patch.has_category {
                    self.error(format!("{}: license '{}' is missing 'category'", source, id));
                }
                return;
            }
        };

        let mut info = LicenseInfo {
            spdx_id: id.to_string(),
            name,
            category,
            osi_approved: false,
            aliases: Vec::new(),
            google_category: None,
            or_later_chain: Vec::new(),
            patent_grant: false,
            patent_retaliation: false,
        };
        apply_patch(&mut info, patch);
        self.nodes.insert(id.to_string(), info);
    }

    fn read_patch(&mut self, source: &str, id: &str, value: &Value) -> Option<LicensePatch> {
        let Value::Table(fields) = value else {
            self.error(format!("{}: license '{}' must be a table", source, id));
            return None;
        };

        let mut patch = LicensePatch::default();
        for (key, value) in fields {
            let ctx = || format!("{}: license '{}': field '{}'", source, id, key);
            match key.as_str() {
                "name" => {
                    patch.name = self.expect_str(value, ctx).map(str::to_string);
                    patch.has_name = true;
                }
                "category" => {
                    if let Some(raw) = self.expect_str(value, ctx) {
                        patch.category = Category::parse(raw);
                        if patch.category.is_none() {
                            self.error(format!("{} has invalid category '{}'", ctx(), raw));
                        }
                    }
                    patch.has_category = true;
                }
                "google_category" => {
                    if let Some(raw) = self.expect_str(value, ctx) {
                        if raw.is_empty() {
                            patch.google_category = Some(None);
                        } else if let Some(category) = GoogleCategory::parse(raw) {
                            patch.google_category = Some(Some(category));
                        } else {
                            self.error(format!("{} has invalid google category '{}'", ctx(), raw));
                        }
                    }
                }
                "osi_approved" => patch.osi_approved = self.expect_bool(value, ctx),
                "patent_grant" => patch.patent_grant = self.expect_bool(value, ctx),
                "patent_retaliation" => patch.patent_retaliation = self.expect_bool(value, ctx),
                "aliases" => patch.aliases = self.expect_str_list(value, ctx),
                "or_later_chain" => patch.or_later_chain = self.expect_str_list(value, ctx),
                _ => self.error(format!(
                    "{}: license '{}': unknown field '{}' (expected one of {})",
                    source,
                    id,
                    key,
                    LICENSE_FIELDS.join(", ")
                )),
            }
        }
        Some(patch)
    }

    fn read_rules(&mut self, source: &str, table: &Table) {
        let rules = match table.get("rule") {
            None => return,
            Some(Value::Array(rules)) => rules,
            Some(_) => {
                self.error(format!("{}: 'rule' must be an array of tables", source));
                return;
            }
        };

        for (index, rule) in rules.iter().enumerate() {
            let Value::Table(rule) = rule else {
                self.error(format!("{}: rule #{} must be a table", source, index + 1));
                continue;
            };
            let ctx = |field: &str| format!("{}: rule #{}: field '{}'", source, index + 1, field);

            for key in rule.keys() {
                if key != "from" && key != "to" {
                    self.error(format!("{}: rule #{}: unknown field '{}'", source, index + 1, key));
                }
            }

            let from = match rule.get("from") {
                Some(value) => self.expect_str(value, || ctx("from")).map(str::to_string),
                None => {
                    self.error(format!("{}: rule #{} is missing 'from'", source, index + 1));
                    None
                }
            };
            let to = match rule.get("to") {
                Some(value) => self.expect_str_list(value, || ctx("to")),
                None => {
                    self.error(format!("{}: rule #{} is missing 'to'", source, index + 1));
                    None
                }
            };

            if let (Some(from), Some(to)) = (from, to) {
                self.edges.entry(from).or_default().extend(to);
            }
        }
    }

    fn expect_str<'v>(&mut self, value: &'v Value, ctx: impl Fn() -> String) -> Option<&'v str> {
        match value {
            Value::String(s) => Some(s.as_str()),
            other => {
                self.error(format!("{} must be a string, found {}", ctx(), other.type_str()));
                None
            }
        }
    }

    fn expect_bool(&mut self, value: &Value, ctx: impl Fn() -> String) -> Option<bool> {
        match value {
            Value::Boolean(b) => Some(*b),
            other => {
                self.error(format!("{} must be a boolean, found {}", ctx(), other.type_str()));
                None
            }
        }
    }

    fn expect_str_list(&mut self, value: &Value, ctx: impl Fn() -> String) -> Option<Vec<String>> {
        let Value::Array(items) = value else {
            self.error(format!(
                "{} must be an array of strings, found {}",
                ctx(),
                value.type_str()
            ));
            return None;
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::String(s) => out.push(s.clone()),
                other => {
                    self.error(format!(
                        "{} must be an array of strings, found a {} element",
                        ctx(),
                        other.type_str()
                    ));
                    return None;
                }
            }
        }
        Some(out)
    }

    fn finish(mut self) -> Result<LicenseGraph, LicenseDataError> {
        for info in self.nodes.values_mut() {
            normalize_chain(info);
        }
        self.validate();

        if !self.errors.is_empty() {
            return Err(LicenseDataError {
                errors: self.errors,
            });
        }

        debug!(
            licenses = self.nodes.len(),
            rules = self.edges.len(),
            "license graph loaded"
        );
        Ok(LicenseGraph {
            nodes: self.nodes,
            edges: self.edges,
        })
    }

    fn validate(&mut self) {
        let mut problems = Vec::new();

        for (from, targets) in &self.edges {
            if !self.nodes.contains_key(from) {
                problems.push(format!("rule source '{}' is not a known license", from));
            }
            for to in targets {
                if !self.nodes.contains_key(to) {
                    problems.push(format!("rule target '{}' (from '{}') is not a known license", to, from));
                }
            }
        }

        // Own ids first so a colliding alias is reported against the alias owner.
        let mut owners: HashMap<String, &str> = HashMap::new();
        for id in self.nodes.keys() {
            if let Some(owner) = owners.insert(id.to_lowercase(), id.as_str()) {
                problems.push(format!(
                    "license '{}' differs from '{}' only by case",
                    id, owner
                ));
            }
        }
        for (id, info) in &self.nodes {
            for alias in &info.aliases {
                match owners.get(&alias.to_lowercase()) {
                    Some(owner) if *owner != id.as_str() => problems.push(format!(
                        "alias '{}' of '{}' is already used by '{}'",
                        alias, id, owner
                    )),
                    Some(_) => {}
                    None => {
                        owners.insert(alias.to_lowercase(), id.as_str());
                    }
                }
            }
        }

        for (id, info) in &self.nodes {
            for later in &info.or_later_chain {
                if !self.nodes.contains_key(later) {
                    problems.push(format!(
                        "or-later chain of '{}' names unknown license '{}'",
                        id, later
                    ));
                }
            }
        }

        self.errors.extend(problems);
    }
}

fn apply_patch(info: &mut LicenseInfo, patch: LicensePatch) {
    if let Some(name) = patch.name {
        info.name = name;
    }
    if let Some(category) = patch.category {
        info.category = category;
    }
    if let Some(osi_approved) = patch.osi_approved {
        info.osi_approved = osi_approved;
    }
    if let Some(aliases) = patch.aliases {
        for alias in aliases {
            if !info.aliases.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
                info.aliases.push(alias);
            }
        }
    }
    if let Some(google_category) = patch.google_category {
        info.google_category = google_category;
    }
    if let Some(chain) = patch.or_later_chain {
        info.or_later_chain = chain;
    }
    if let Some(patent_grant) = patch.patent_grant {
        info.patent_grant = patent_grant;
    }
    if let Some(patent_retaliation) = patch.patent_retaliation {
        info.patent_retaliation = patent_retaliation;
    }
}

/// The chain always starts with the license itself.
fn normalize_chain(info: &mut LicenseInfo) {
    let id = info.spdx_id.clone();
    info.or_later_chain.retain(|later| *later != id);
    info.or_later_chain.insert(0, id);
}

#[cfg(test)]
mod tests {
    use super::*;

    const LICENSES: &str = r#"
[licenses."MIT"]
name = "MIT License"
category = "permissive"
osi_approved = true
aliases = ["Expat"]

[licenses."GPL-2.0-only"]
name = "GNU General Public License v2.0 only"
category = "strong-copyleft"
google_category = "restricted"
or_later_chain = ["GPL-2.0-only", "GPL-3.0-only"]

[licenses."GPL-3.0-only"]
name = "GNU General Public License v3.0 only"
category = "strong-copyleft"
"#;

    const RULES: &str = r#"
[[rule]]
from = "MIT"
to = ["MIT"]

[[rule]]
from = "GPL-3.0-only"
to = ["MIT", "GPL-3.0-only"]

[[rule]]
from = "GPL-3.0-only"
to = ["GPL-2.0-only"]
"#;

    #[test]
    fn test_load_small_graph() {
        let graph = load(LICENSES, RULES, None).unwrap();
        assert!(graph.known("MIT"));
        assert_eq!(graph.category("GPL-2.0-only"), "strong-copyleft");
        assert_eq!(graph.google_category("GPL-2.0-only"), "restricted");
        assert!(graph.info("MIT").unwrap().osi_approved);

        let targets: Vec<&str> = graph.compatible_with("GPL-3.0-only").collect();
        assert_eq!(targets, vec!["GPL-2.0-only", "GPL-3.0-only", "MIT"]);
    }

    #[test]
    fn test_chain_gets_own_id_first() {
        let graph = load(LICENSES, RULES, None).unwrap();
        assert_eq!(graph.info("MIT").unwrap().or_later_chain, vec!["MIT"]);
        assert_eq!(
            graph.info("GPL-2.0-only").unwrap().or_later_chain,
            vec!["GPL-2.0-only", "GPL-3.0-only"]
        );
    }

    #[test]
    fn test_all_defects_are_collected() {
        let licenses = r#"
[licenses."A"]
category = "permissive"

[licenses."B"]
name = "B"
category = "copyleft-ish"

[licenses."C"]
name = 3
category = "permissive"
google_category = "weird"
aliases = ["a"]
"#;
        let rules = r#"
[[rule]]
from = "A"
to = ["Z"]

[[rule]]
to = ["A"]
"#;
        let err = load(licenses, rules, None).unwrap_err();
        let joined = err.errors.join("\n");
        assert!(joined.contains("'A' is missing 'name'"), "{}", joined);
        assert!(joined.contains("invalid category 'copyleft-ish'"), "{}", joined);
        assert!(joined.contains("'name' must be a string"), "{}", joined);
        assert!(joined.contains("invalid google category 'weird'"), "{}", joined);
        assert!(joined.contains("rule #2 is missing 'from'"), "{}", joined);
        assert!(joined.contains("rule source 'A' is not a known license"), "{}", joined);
        assert!(joined.contains("rule target 'Z'"), "{}", joined);
        assert_eq!(err.errors.len(), 7, "{}", joined);
    }

    #[test]
    fn test_alias_collision_with_self_alias() {
        let licenses = r#"
[licenses."MIT"]
name = "MIT"
category = "permissive"

[licenses."X11"]
name = "X11"
category = "permissive"
aliases = ["mit"]
"#;
        let err = load(licenses, "", None).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains("alias 'mit' of 'X11' is already used by 'MIT'"));
    }

    #[test]
    fn test_ids_differing_only_by_case_collide() {
        let licenses = r#"
[licenses."MIT"]
name = "MIT"
category = "permissive"

[licenses."mit"]
name = "lowercase MIT"
category = "permissive"
"#;
        let err = load(licenses, "", None).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains("license 'mit' differs from 'MIT' only by case"));
    }

    #[test]
    fn test_unknown_chain_entry() {
        let licenses = r#"
[licenses."GPL-2.0-only"]
name = "GPL"
category = "strong-copyleft"
or_later_chain = ["GPL-2.0-only", "GPL-9.0-only"]
"#;
        let err = load(licenses, "", None).unwrap_err();
        assert!(err.errors[0].contains("GPL-9.0-only"));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let err = load("[licenses", RULES, None).unwrap_err();
        assert!(err.errors[0].starts_with("builtin licenses:"));
    }

    #[test]
    fn test_unknown_field_and_section() {
        let licenses = r#"
spdx_version = "3.0"

[licenses."MIT"]
name = "MIT"
category = "permissive"
colour = "blue"
"#;
        let err = load(licenses, "", None).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.errors[0].contains("unknown section 'spdx_version'"));
        assert!(err.errors[1].contains("unknown field 'colour'"));
    }

    #[test]
    fn test_user_table_merges() {
        let user = r#"
[licenses."MIT"]
aliases = ["MIT/X"]
google_category = "notice"

[licenses."Corp-1.0"]
name = "Corp License"
category = "proprietary"

[[rule]]
from = "MIT"
to = ["Corp-1.0"]
"#;
        let graph = load(LICENSES, RULES, Some(user)).unwrap();
        let mit = graph.info("MIT").unwrap();
        assert_eq!(mit.aliases, vec!["Expat", "MIT/X"]);
        assert_eq!(mit.name, "MIT License");
        assert_eq!(graph.google_category("MIT"), "notice");
        assert!(graph.is_compatible("MIT", "Corp-1.0"));
        assert!(graph.is_compatible("MIT", "MIT"));
    }

    #[test]
    fn test_user_table_new_license_needs_name() {
        let user = r#"
[licenses."Corp-1.0"]
category = "proprietary"
"#;
        let err = load(LICENSES, RULES, Some(user)).unwrap_err();
        assert_eq!(
            err.errors,
            vec!["user table: license 'Corp-1.0' is missing 'name'".to_string()]
        );
    }
}
