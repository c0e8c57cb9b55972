use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::age::AgePolicy;
use crate::completeness::ArchiveNamePolicy;
use crate::content::ContentOptions;
use crate::discover::DiscoveryOptions;
use crate::notify::NotifyPolicy;
use crate::scan::AuditOptions;
use crate::validate::ValidationOptions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    pub backup_paths: Vec<PathBuf>,
    /// Accepted for compatibility; hash verification is not performed.
    #[serde(default)]
    pub check_hash: bool,
    #[serde(default = "default_deep_validation")]
    pub deep_validation: bool,
    #[serde(default = "default_max_sample_bytes", alias = "max_zip_sample_size")]
    pub max_sample_bytes: u64,
    #[serde(default = "default_catalog_extensions")]
    pub required_catalog_extensions: Vec<String>,
    #[serde(default = "default_min_backup_age")]
    pub min_backup_age: String,
    #[serde(default = "default_max_backup_age")]
    pub max_backup_age: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default)]
    pub flag_unrecognized_archives: bool,
    #[serde(default)]
    pub notify: NotifyPolicy,
}

fn default_deep_validation() -> bool {
    true
}

fn default_max_sample_bytes() -> u64 {
    1024
}

fn default_catalog_extensions() -> Vec<String> {
    vec![".wbcat".to_string(), ".cat".to_string()]
}

fn default_min_backup_age() -> String {
    "1h".to_string()
}

fn default_max_backup_age() -> String {
    "90d".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_timeout() -> String {
    "30m".to_string()
}

impl AuditConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backup_paths.is_empty() {
            bail!("no backup paths specified in config");
        }
        if self.max_sample_bytes == 0 {
            bail!("max_sample_bytes must be greater than zero");
        }
        parse_duration(&self.timeout).context("invalid timeout duration")?;
        let policy = self.age_policy()?;
        if policy.min_age >= policy.max_age {
            bail!("min_backup_age must be shorter than max_backup_age");
        }
        Ok(())
    }

    pub fn age_policy(&self) -> Result<AgePolicy> {
        let min_age = parse_duration(&self.min_backup_age).context("invalid min_backup_age")?;
        let max_age = parse_duration(&self.max_backup_age).context("invalid max_backup_age")?;
        Ok(AgePolicy {
            min_age: chrono::Duration::from_std(min_age).context("min_backup_age out of range")?,
            max_age: chrono::Duration::from_std(max_age).context("max_backup_age out of range")?,
        })
    }

    pub fn to_audit_options(&self) -> Result<AuditOptions> {
        self.validate()?;
        if self.check_hash {
            warn!("check_hash is set but hash verification is not supported; ignoring");
        }

        Ok(AuditOptions {
            roots: self.backup_paths.clone(),
            workers: self.workers,
            timeout: Some(parse_duration(&self.timeout)?),
            discovery: DiscoveryOptions::with_extensions(&self.required_catalog_extensions),
            validation: ValidationOptions {
                content: ContentOptions {
                    deep: self.deep_validation,
                    sample_bytes: self.max_sample_bytes,
                    ..ContentOptions::default()
                },
                age: self.age_policy()?,
                archive_names: if self.flag_unrecognized_archives {
                    ArchiveNamePolicy::Flag
                } else {
                    ArchiveNamePolicy::Ignore
                },
            },
            ..AuditOptions::default()
        })
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AuditConfig> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    let config: AuditConfig = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

/// Parses `<integer><unit>` where unit is one of `s`, `m`, `h`, `d`.
pub fn parse_duration(text: &str) -> Result<Duration> {
    let text = text.trim();
    let split = text
        .find(|ch: char| !ch.is_ascii_digit())
        .ok_or_else(|| anyhow!("duration '{text}' is missing a unit (s, m, h, d)"))?;
    let (value, unit) = text.split_at(split);
    let value: u64 = value
        .parse()
        .map_err(|_| anyhow!("duration '{text}' must start with a whole number"))?;
    let seconds = match unit {
        "s" => Some(value),
        "m" => value.checked_mul(60),
        "h" => value.checked_mul(3600),
        "d" => value.checked_mul(86_400),
        other => bail!("unknown duration unit '{other}' in '{text}'"),
    }
    .ok_or_else(|| anyhow!("duration '{text}' is too large"))?;
    Ok(Duration::from_secs(seconds))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::{load_config, parse_duration, AuditConfig};
    use crate::age::AgePolicy;
    use crate::completeness::ArchiveNamePolicy;

    #[test]
    fn parses_duration_units() {
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("24h").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("90d").unwrap(), Duration::from_secs(90 * 86_400));
        assert!(parse_duration("90").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("3w").is_err());
    }

    #[test]
    fn example_config_parses_with_defaults() {
        let config: AuditConfig =
            serde_json::from_str(include_str!("../../../configs/config.example.json"))
                .expect("example config parses");
        config.validate().expect("example config is valid");

        let options = config.to_audit_options().expect("options build");
        assert_eq!(options.roots.len(), config.backup_paths.len());
        assert_eq!(options.validation.age, AgePolicy::default());
        assert_eq!(options.discovery.catalog_extensions, vec!["wbcat", "cat"]);
    }

    #[test]
    fn configured_age_bounds_reach_the_validator() {
        let config: AuditConfig = serde_json::from_str(
            r#"{
                "backup_paths": ["/backups"],
                "min_backup_age": "2h",
                "max_backup_age": "30d",
                "max_zip_sample_size": 4096,
                "flag_unrecognized_archives": true
            }"#,
        )
        .expect("config parses");

        let options = config.to_audit_options().expect("options build");
        assert_eq!(options.validation.age.min_age, chrono::Duration::hours(2));
        assert_eq!(options.validation.age.max_age, chrono::Duration::days(30));
        assert_eq!(options.validation.content.sample_bytes, 4096);
        assert_eq!(options.validation.archive_names, ArchiveNamePolicy::Flag);
    }

    #[test]
    fn rejects_invalid_configs() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("config.json");

        fs::write(&path, r#"{ "backup_paths": [] }"#).expect("write");
        assert!(load_config(&path).is_err());

        fs::write(
            &path,
            r#"{ "backup_paths": ["/b"], "min_backup_age": "30d", "max_backup_age": "1d" }"#,
        )
        .expect("write");
        assert!(load_config(&path).is_err());

        fs::write(&path, r#"{ "backup_paths": ["/b"], "timeout": "soon" }"#).expect("write");
        assert!(load_config(&path).is_err());

        assert!(load_config(temp.path().join("missing.json")).is_err());
    }
}
