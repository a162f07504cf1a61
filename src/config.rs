// src/config.rs

//! Configuration loading utilities.
//!
//! The Lambda function is configured through environment variables. An
//! optional TOML file (`CONFIG_PATH`) is read first and environment values
//! override it. The result is validated once and never mutated afterwards.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::{Config, OrderingPolicy};

/// Build the configuration from the process environment.
pub fn from_env() -> Result<Config> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Build the configuration from an arbitrary variable lookup.
pub fn from_lookup<F>(lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match lookup("CONFIG_PATH") {
        Some(path) if !path.trim().is_empty() => Config::load(&path).map_err(|e| {
            AppError::config(format!("Failed to load config from {path}: {e}"))
        })?,
        _ => Config::default(),
    };

    apply_overrides(&mut config, lookup)?;
    config.validate()?;
    Ok(config)
}

/// Load a TOML file (falling back to defaults) and apply environment overrides.
pub fn load_with_env(path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(path);
    apply_overrides(&mut config, |name| std::env::var(name).ok())?;
    config.validate()?;
    Ok(config)
}

/// Override configuration values with whatever `lookup` provides.
pub fn apply_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    // First non-blank of a canonical name and its legacy spellings.
    let get_any = |names: &[&str]| names.iter().find_map(|&name| get(name));

    if let Some(region) = get_any(&["AWS_REGION", "region"]) {
        config.aws.region = region;
    }
    if let Some(bucket) = get_any(&["S3_BUCKET", "s3Bucket", "s3bucket"]) {
        config.storage.bucket = bucket;
    }
    if let Some(name) = get("DATABASE_NAME") {
        config.storage.database_name = name;
    }
    if let Some(folder) = get_any(&["TEMP_FOLDER", "tempFolder"]) {
        config.storage.staging_dir = PathBuf::from(folder);
    }
    if let Some(token) = get("TOKEN_NAME") {
        config.secrets.token_name = token;
    }
    if let Some(hours) = get("CRAWL_WINDOW_HOURS") {
        config.crawl.window_hours = parse_number("CRAWL_WINDOW_HOURS", &hours)?;
    }
    if let Some(ordering) = get("CRAWL_ORDERING") {
        config.crawl.ordering = ordering.parse::<OrderingPolicy>()?;
    }
    if let Some(pages) = get("CRAWL_MAX_PAGES") {
        config.crawl.max_pages = parse_number("CRAWL_MAX_PAGES", &pages)?;
    }
    if let Some(timeout) = get("CRAWL_TIMEOUT_SECS") {
        config.crawl.timeout_secs = parse_number("CRAWL_TIMEOUT_SECS", &timeout)?;
    }
    if let Some(enabled) = get("LEASE_ENABLED") {
        config.lease.enabled = parse_bool("LEASE_ENABLED", &enabled)?;
    }
    if let Some(ttl) = get("LEASE_TTL_SECS") {
        config.lease.ttl_secs = parse_number("LEASE_TTL_SECS", &ttl)?;
    }
    if let Some(deadline) = get("RUN_DEADLINE_SECS") {
        config.run.deadline_secs = parse_number("RUN_DEADLINE_SECS", &deadline)?;
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("{name}={value:?} is not a number: {e}")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!("{name}={value:?} is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.storage.bucket, "retgits-fdio");
        assert_eq!(config.crawl.window_hours, 48);
    }

    #[test]
    fn test_env_overrides() {
        let config = from_lookup(lookup(&[
            ("AWS_REGION", "eu-west-1"),
            ("S3_BUCKET", "other-bucket"),
            ("TEMP_FOLDER", "/var/tmp"),
            ("CRAWL_WINDOW_HOURS", "24"),
            ("CRAWL_ORDERING", "trust"),
            ("LEASE_ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(config.aws.region, "eu-west-1");
        assert_eq!(config.storage.bucket, "other-bucket");
        assert_eq!(config.storage.staged_path(), PathBuf::from("/var/tmp/fdiodb.db"));
        assert_eq!(config.crawl.window_hours, 24);
        assert_eq!(config.crawl.ordering, OrderingPolicy::Trust);
        assert!(!config.lease.enabled);
    }

    #[test]
    fn test_legacy_variable_names() {
        let config = from_lookup(lookup(&[
            ("region", "eu-central-1"),
            ("s3Bucket", "legacy-bucket"),
            ("tempFolder", "/scratch"),
        ]))
        .unwrap();

        assert_eq!(config.aws.region, "eu-central-1");
        assert_eq!(config.storage.bucket, "legacy-bucket");
        assert_eq!(config.storage.staging_dir, PathBuf::from("/scratch"));
    }

    #[test]
    fn test_canonical_name_beats_legacy_name() {
        let config = from_lookup(lookup(&[
            ("S3_BUCKET", "canonical"),
            ("s3bucket", "legacy"),
        ]))
        .unwrap();
        assert_eq!(config.storage.bucket, "canonical");
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = from_lookup(lookup(&[("S3_BUCKET", "  ")])).unwrap();
        assert_eq!(config.storage.bucket, "retgits-fdio");
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = from_lookup(lookup(&[("CRAWL_WINDOW_HOURS", "two days")])).unwrap_err();
        assert!(err.to_string().contains("CRAWL_WINDOW_HOURS"));
    }

    #[test]
    fn test_overrides_fail_validation() {
        assert!(from_lookup(lookup(&[("CRAWL_WINDOW_HOURS", "0")])).is_err());
    }

    #[test]
    fn test_config_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\nbucket = \"from-file\"\n[crawl]\nwindow_hours = 12").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = from_lookup(lookup(&[
            ("CONFIG_PATH", path.as_str()),
            ("CRAWL_WINDOW_HOURS", "6"),
        ]))
        .unwrap();

        assert_eq!(config.storage.bucket, "from-file");
        assert_eq!(config.crawl.window_hours, 6);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(from_lookup(lookup(&[("CONFIG_PATH", "/nonexistent/fdio.toml")])).is_err());
    }
}
