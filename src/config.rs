// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::build::BuildConfig;
use crate::notify::slack::SlackConfig;
use crate::preview::{NamespaceMode, TagStrategy};
use anyhow::{bail, Context, Result};
use std::collections::HashSet;
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Controller configuration loaded once from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    /// Shared secret for `X-Hub-Signature-256`; empty rejects every delivery
    pub webhook_secret: String,
    /// Lowercased GitHub orgs allowed to trigger previews; empty allows all
    pub allowed_orgs: HashSet<String>,
    /// JSON or YAML file mapping `org/repo` to an app definition
    pub mapping_file: PathBuf,
    pub preview: PreviewSettings,
    /// Present when images should be built before deploying
    pub build: Option<BuildConfig>,
    pub github: GitHubConfig,
    pub slack: Option<SlackConfig>,
    pub workers: usize,
    pub queue_size: usize,
    pub cleanup: CleanupConfig,
    pub timeouts: Timeouts,
}

/// Templates and strategies used to resolve a preview from a PR
#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub namespace_mode: NamespaceMode,
    pub base_namespace: String,
    pub route_template: String,
    pub image_template: String,
    pub tag_strategy: TagStrategy,
    pub default_port: i32,
    /// Leave the preview running after its PR is merged
    pub keep_on_merge: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub initial_delay: Duration,
    /// Previews untouched for longer than this are deleted
    pub max_age: Duration,
}

/// Upper bounds for each stage of work
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub build: Duration,
    pub reconcile: Duration,
    pub cleanup: Duration,
    pub notify: Duration,
    pub shutdown_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            build: Duration::from_secs(20 * 60),
            reconcile: Duration::from_secs(2 * 60),
            cleanup: Duration::from_secs(5 * 60),
            notify: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &str| {
            var(key).with_context(|| format!("{} environment variable not set", key))
        };

        let namespace_mode: NamespaceMode = required("PREVIEW_NAMESPACE_MODE")?
            .parse()
            .context("PREVIEW_NAMESPACE_MODE is invalid")?;
        let base_namespace = var("PREVIEW_BASE_NAMESPACE").unwrap_or_default();
        if base_namespace.is_empty() && namespace_mode != NamespaceMode::PerPr {
            bail!(
                "PREVIEW_BASE_NAMESPACE is required for namespace mode {}",
                namespace_mode
            );
        }

        let tag_strategy: TagStrategy = required("IMAGE_TAG_STRATEGY")?
            .parse()
            .context("IMAGE_TAG_STRATEGY is invalid")?;

        let default_port: i32 = parse_or(var("DEFAULT_CONTAINER_PORT"), "DEFAULT_CONTAINER_PORT", 8080)?;
        if !(1..=65535).contains(&default_port) {
            bail!("DEFAULT_CONTAINER_PORT out of range: {}", default_port);
        }

        let preview = PreviewSettings {
            namespace_mode,
            base_namespace,
            route_template: required("ROUTE_DOMAIN_TEMPLATE")?,
            image_template: required("IMAGE_REF_TEMPLATE")?,
            tag_strategy,
            default_port,
            keep_on_merge: parse_bool(var("PREVIEW_KEEP_ON_MERGE"), "PREVIEW_KEEP_ON_MERGE", false)?,
        };

        let build = if parse_bool(var("PREVIEW_BUILD_ENABLED"), "PREVIEW_BUILD_ENABLED", false)? {
            let defaults = BuildConfig::default();
            Some(BuildConfig {
                dockerfile: var("BUILD_DOCKERFILE").unwrap_or(defaults.dockerfile),
                platform: var("BUILD_PLATFORM").unwrap_or(defaults.platform),
                use_buildx: parse_bool(var("BUILD_USE_BUILDX"), "BUILD_USE_BUILDX", defaults.use_buildx)?,
            })
        } else {
            None
        };

        let allowed_orgs = var("GITHUB_ORGS")
            .map(|raw| parse_org_list(&raw))
            .unwrap_or_default();

        let github = GitHubConfig {
            token: var("GITHUB_TOKEN"),
            api_url: var("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
        };

        let slack = SlackConfig::from_parts(
            var("SLACK_WEBHOOK_URL"),
            var("SLACK_BOT_TOKEN"),
            var("SLACK_CHANNEL_ID"),
        );

        let workers: usize = parse_or(var("PREVIEW_WORKERS"), "PREVIEW_WORKERS", 2)?;
        let queue_size: usize = parse_or(var("PREVIEW_QUEUE_SIZE"), "PREVIEW_QUEUE_SIZE", 32)?;
        if workers == 0 || queue_size == 0 {
            bail!("PREVIEW_WORKERS and PREVIEW_QUEUE_SIZE must be at least 1");
        }

        let cleanup = CleanupConfig {
            enabled: parse_bool(var("CLEANUP_ENABLED"), "CLEANUP_ENABLED", true)?,
            interval: minutes(parse_or(var("CLEANUP_INTERVAL_MINUTES"), "CLEANUP_INTERVAL_MINUTES", 60)?),
            initial_delay: Duration::from_secs(parse_or(
                var("CLEANUP_INITIAL_DELAY_SECONDS"),
                "CLEANUP_INITIAL_DELAY_SECONDS",
                30,
            )?),
            max_age: hours(parse_or(var("PREVIEW_MAX_AGE_HOURS"), "PREVIEW_MAX_AGE_HOURS", 7 * 24)?),
        };
        if cleanup.enabled && cleanup.interval.is_zero() {
            bail!("CLEANUP_INTERVAL_MINUTES must be at least 1");
        }

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            build: seconds_or(var("BUILD_TIMEOUT_SECONDS"), "BUILD_TIMEOUT_SECONDS", defaults.build)?,
            reconcile: seconds_or(var("RECONCILE_TIMEOUT_SECONDS"), "RECONCILE_TIMEOUT_SECONDS", defaults.reconcile)?,
            cleanup: seconds_or(var("CLEANUP_TIMEOUT_SECONDS"), "CLEANUP_TIMEOUT_SECONDS", defaults.cleanup)?,
            notify: seconds_or(var("NOTIFY_TIMEOUT_SECONDS"), "NOTIFY_TIMEOUT_SECONDS", defaults.notify)?,
            shutdown_grace: seconds_or(var("SHUTDOWN_GRACE_SECONDS"), "SHUTDOWN_GRACE_SECONDS", defaults.shutdown_grace)?,
        };

        Ok(Config {
            listen_addr: var("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            webhook_secret: var("GITHUB_WEBHOOK_SECRET").unwrap_or_default(),
            allowed_orgs,
            mapping_file: PathBuf::from(required("PREVIEW_MAPPING_FILE")?),
            preview,
            build,
            github,
            slack,
            workers,
            queue_size,
            cleanup,
            timeouts,
        })
    }

    /// Check whether the org owning `repo_full_name` may trigger previews
    pub fn org_allowed(&self, repo_full_name: &str) -> bool {
        if self.allowed_orgs.is_empty() {
            return true;
        }
        match repo_full_name.split_once('/') {
            Some((org, repo)) if !repo.contains('/') => {
                self.allowed_orgs.contains(&org.to_lowercase())
            }
            _ => false,
        }
    }
}

fn parse_org_list(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|org| !org.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} invalid: {}", key, e)),
        None => Ok(default),
    }
}

fn parse_bool(value: Option<String>, key: &str, default: bool) -> Result<bool> {
    match value.as_deref().map(str::to_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => bail!("{} invalid boolean: {}", key, other),
    }
}

fn seconds_or(value: Option<String>, key: &str, default: Duration) -> Result<Duration> {
    parse_or(value, key, default.as_secs()).map(Duration::from_secs)
}

fn minutes(value: u64) -> Duration {
    Duration::from_secs(value * 60)
}

fn hours(value: u64) -> Duration {
    Duration::from_secs(value * 60 * 60)
}
