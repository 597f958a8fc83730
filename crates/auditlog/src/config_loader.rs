//! Run configuration loading.
//!
//! The file is read, passed through `expand_env`, parsed as TOML and then
//! checked with [`validate_run_config`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use auditlog_core::validate_run_config;
use auditlog_types::RunConfig;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "auditlog.toml";

/// The explicit path, else `./auditlog.toml` if it exists.
pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
    if fallback.exists() {
        return Ok(fallback);
    }
    bail!("No configuration file found. Specify --config or create {DEFAULT_CONFIG_FILE}");
}

/// Parse configuration text without validating it.
pub fn parse_run_config<F>(text: &str, origin: &Path, expand_env: F) -> Result<RunConfig>
where
    F: Fn(&str) -> Result<String>,
{
    let expanded = expand_env(text)?;
    toml::from_str(&expanded).with_context(|| format!("parse config '{}'", origin.display()))
}

/// Load and validate a run configuration file.
pub fn load_run_config<F>(path: &Path, expand_env: F) -> Result<RunConfig>
where
    F: Fn(&str) -> Result<String>,
{
    debug!("Loading config from '{}'", path.display());

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config '{}'", path.display()))?;
    let config = parse_run_config(&text, path, expand_env)?;
    validate_run_config(&config).with_context(|| format!("invalid config '{}'", path.display()))?;

    debug!(
        audit_type = config.audit_type.as_str(),
        environment = config.environment.as_str(),
        recipients = config.recipients.len(),
        "Loaded config"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditlog_testkit::sample_configs;
    use auditlog_types::{AuditType, EmptyReportPolicy, Environment};
    use tempfile::TempDir;

    fn no_expand(s: &str) -> Result<String> {
        Ok(s.to_string())
    }

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("auditlog.toml");
        std::fs::write(&path, contents).expect("write config");
        path
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), sample_configs::MINIMAL_TOML);

        let config = load_run_config(&path, no_expand).expect("load");
        assert!(config.restrict_to_production);
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.empty_report, EmptyReportPolicy::Skip);
        assert!(config.dedupe);
    }

    #[test]
    fn expansion_runs_before_parsing() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"
folder_id = 42
recipients = ["ops@example.com"]
author_id = 7
audit_type = "AUDIT_TYPE"
"#,
        );

        let config = load_run_config(&path, |s| Ok(s.replace("AUDIT_TYPE", "scripts")))
            .expect("load");
        assert_eq!(config.audit_type, AuditType::Scripts);
    }

    #[test]
    fn expansion_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let path = write_config(dir.path(), sample_configs::MINIMAL_TOML);

        let err = load_run_config(&path, |_| bail!("environment variable 'X' is not set"))
            .unwrap_err();
        assert!(err.to_string().contains("'X' is not set"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            &format!("{}\nfolder = 3\n", sample_configs::MINIMAL_TOML),
        );

        let err = load_run_config(&path, no_expand).unwrap_err();
        assert!(format!("{err:#}").contains("unknown field"));
    }

    #[test]
    fn recipient_limits_are_enforced() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            dir.path(),
            r#"
folder_id = 42
recipients = []
author_id = 7
audit_type = "features"
"#,
        );

        let err = load_run_config(&path, no_expand).unwrap_err();
        assert!(format!("{err:#}").contains("at least one recipient"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = load_run_config(&dir.path().join("nope.toml"), no_expand).unwrap_err();
        assert!(err.to_string().contains("read config"));
    }

    #[test]
    fn explicit_path_wins() {
        let path = PathBuf::from("/somewhere/else.toml");
        assert_eq!(resolve_config_path(Some(path.clone())).unwrap(), path);
    }
}
