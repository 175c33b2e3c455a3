use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// Root configuration structure, deserialized from `.license-compat/config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub project: ProjectConfig,
    pub policy: PolicyConfig,
    /// User override table merged on top of the bundled license data.
    /// Relative paths are resolved against the config file's directory.
    pub license_data: Option<PathBuf>,
    /// File this config was read from, `None` for the built-in default.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// The project's own license, as an SPDX identifier or a known alias.
    pub license: Option<String>,
}

/// Organizational license policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyConfig {
    /// Packages skipped by both the deny check and the compatibility check.
    pub exempt_packages: BTreeSet<String>,
    /// Licenses accepted without a compatibility check.
    pub allow_licenses: BTreeSet<String>,
    /// Licenses that fail the run wherever they appear in an expression.
    pub deny_licenses: BTreeSet<String>,
    /// Package name → license expression used instead of the declared one.
    pub license_overrides: BTreeMap<String, String>,
    /// Package name → denied licenses tolerated for that package only.
    pub project_exceptions: BTreeMap<String, BTreeSet<String>>,
    /// Denied licenses tolerated for every package.
    pub workspace_exceptions: BTreeSet<String>,
}

impl PolicyConfig {
    /// `deny_licenses − workspace_exceptions − project_exceptions[package]`.
    pub fn effective_deny(&self, package: &str) -> BTreeSet<&str> {
        let excepted = self.project_exceptions.get(package);
        self.deny_licenses
            .iter()
            .filter(|id| !self.workspace_exceptions.contains(*id))
            .filter(|id| excepted.map_or(true, |set| !set.contains(*id)))
            .map(String::as_str)
            .collect()
    }

    /// Rewrite every license id of the policy through `canonical`.
    ///
    /// Lets a config say `GPL-3.0` while the graph speaks `GPL-3.0-only`.
    pub fn canonicalize<F>(&self, canonical: F) -> PolicyConfig
    where
        F: Fn(&str) -> String,
    {
        let set = |ids: &BTreeSet<String>| -> BTreeSet<String> {
            ids.iter().map(|id| canonical(id)).collect()
        };
        PolicyConfig {
            exempt_packages: self.exempt_packages.clone(),
            allow_licenses: set(&self.allow_licenses),
            deny_licenses: set(&self.deny_licenses),
            license_overrides: self.license_overrides.clone(),
            project_exceptions: self
                .project_exceptions
                .iter()
                .map(|(package, ids)| (package.clone(), set(ids)))
                .collect(),
            workspace_exceptions: set(&self.workspace_exceptions),
        }
    }
}

/// Load the configuration, searching in order:
///
/// 1. `config_override`, the path passed via `--config`
/// 2. `<project_path>/.license-compat/config.toml`
/// 3. `~/.config/license-compat/config.toml`
/// 4. Built-in [`Config::default`]
pub fn load_config(project_path: &Path, config_override: Option<&Path>) -> Result<Config> {
    if let Some(path) = config_override {
        return read_config(path);
    }

    let project_config = project_path.join(".license-compat").join("config.toml");
    if project_config.exists() {
        return read_config(&project_config);
    }

    if let Some(home) = dirs::home_dir() {
        let home_config = home
            .join(".config")
            .join("license-compat")
            .join("config.toml");
        if home_config.exists() {
            return read_config(&home_config);
        }
    }

    debug!("no config file found, using the built-in default");
    Ok(Config::default())
}

fn read_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    if let Some(data) = config.license_data.take() {
        let resolved = match path.parent() {
            Some(dir) if data.is_relative() => dir.join(data),
            _ => data,
        };
        config.license_data = Some(resolved);
    }

    debug!(path = %path.display(), "loaded config");
    config.source = Some(path.to_path_buf());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let config_dir = dir.join(".license-compat");
        std::fs::create_dir_all(&config_dir).unwrap();
        let path = config_dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_full_config() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
license_data = "licenses.toml"

[project]
license = "MIT"

[policy]
exempt_packages = ["internal-tool"]
allow_licenses = ["MPL-2.0"]
deny_licenses = ["AGPL-3.0-only", "GPL-3.0-only"]
workspace_exceptions = ["GPL-3.0-only"]

[policy.license_overrides]
left-pad = "MIT"

[policy.project_exceptions]
mongo-driver = ["AGPL-3.0-only"]
"#,
        );

        let config = load_config(dir.path(), None).unwrap();
        assert_eq!(config.project.license.as_deref(), Some("MIT"));
        assert!(config.policy.exempt_packages.contains("internal-tool"));
        assert_eq!(
            config.policy.license_overrides.get("left-pad").map(String::as_str),
            Some("MIT")
        );
        assert_eq!(
            config.license_data,
            Some(dir.path().join(".license-compat").join("licenses.toml"))
        );
        assert!(config.source.is_some());
    }

    #[test]
    fn test_override_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[project]\nlicense = \"MIT\"\n");
        let other = dir.path().join("other.toml");
        std::fs::write(&other, "[project]\nlicense = \"Apache-2.0\"\n").unwrap();

        let config = load_config(dir.path(), Some(&other)).unwrap();
        assert_eq!(config.project.license.as_deref(), Some("Apache-2.0"));
    }

    #[test]
    fn test_missing_override_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(dir.path(), "[policy]\ndeny = [\"GPL-3.0-only\"]\n");
        let err = load_config(dir.path(), Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown field"));
    }

    #[test]
    fn test_absolute_license_data_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.toml");
        let path = write_config(
            dir.path(),
            &format!("license_data = {:?}\n", data.display().to_string()),
        );
        let config = load_config(dir.path(), Some(&path)).unwrap();
        assert_eq!(config.license_data, Some(data));
    }

    #[test]
    fn test_effective_deny_scoping() {
        let policy: PolicyConfig = toml::from_str(
            r#"
deny_licenses = ["AGPL-3.0-only", "GPL-3.0-only", "SSPL-1.0"]
workspace_exceptions = ["SSPL-1.0"]

[project_exceptions]
mongo-driver = ["AGPL-3.0-only"]
"#,
        )
        .unwrap();

        let general: Vec<&str> = policy.effective_deny("left-pad").into_iter().collect();
        assert_eq!(general, vec!["AGPL-3.0-only", "GPL-3.0-only"]);

        let scoped: Vec<&str> = policy.effective_deny("mongo-driver").into_iter().collect();
        assert_eq!(scoped, vec!["GPL-3.0-only"]);
    }

    #[test]
    fn test_canonicalize_rewrites_ids_only() {
        let policy: PolicyConfig = toml::from_str(
            r#"
exempt_packages = ["GPL-3.0"]
deny_licenses = ["GPL-3.0"]

[project_exceptions]
foo = ["GPL-3.0"]
"#,
        )
        .unwrap();
        let canonical = policy.canonicalize(|id| {
            if id == "GPL-3.0" {
                "GPL-3.0-only".to_string()
            } else {
                id.to_string()
            }
        });
        assert!(canonical.deny_licenses.contains("GPL-3.0-only"));
        assert!(canonical.project_exceptions["foo"].contains("GPL-3.0-only"));
        assert!(canonical.exempt_packages.contains("GPL-3.0"));
    }

    #[test]
    fn test_default_is_empty() {
        let config = Config::default();
        assert!(config.project.license.is_none());
        assert!(config.policy.deny_licenses.is_empty());
        assert!(config.license_data.is_none());
    }
}
