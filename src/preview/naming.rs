// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic names for preview namespaces, objects and images.

use crate::constants::UNKNOWN_LABEL_VALUE;
use crate::error::{PreviewError, Result};
use std::fmt;
use std::str::FromStr;

/// How previews share or isolate cluster namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamespaceMode {
    /// Every preview lives in the configured base namespace
    Single,
    /// One namespace per app, shared by all of its PRs
    PerApp,
    /// One namespace per PR, owned entirely by that preview
    PerPr,
}

impl FromStr for NamespaceMode {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(NamespaceMode::Single),
            "per-app" => Ok(NamespaceMode::PerApp),
            "per-pr" => Ok(NamespaceMode::PerPr),
            other => Err(PreviewError::ConfigError(format!(
                "unknown namespace mode: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for NamespaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceMode::Single => write!(f, "single"),
            NamespaceMode::PerApp => write!(f, "per-app"),
            NamespaceMode::PerPr => write!(f, "per-pr"),
        }
    }
}

/// How the image tag is derived from the PR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagStrategy {
    Sha,
    Pr,
    PrSha,
}

impl FromStr for TagStrategy {
    type Err = PreviewError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha" => Ok(TagStrategy::Sha),
            "pr" => Ok(TagStrategy::Pr),
            "pr-sha" => Ok(TagStrategy::PrSha),
            other => Err(PreviewError::ConfigError(format!(
                "unknown image tag strategy: {}",
                other
            ))),
        }
    }
}

/// Name shared by every object of a preview, and the per-pr namespace
pub fn resource_name(app: &str, pr_number: u64) -> String {
    format!("{}-pr-{}", app, pr_number)
}

pub fn namespace_for_mode(
    mode: NamespaceMode,
    base: &str,
    app: &str,
    pr_number: u64,
) -> Result<String> {
    match mode {
        NamespaceMode::Single => {
            if base.is_empty() {
                return Err(PreviewError::ConfigError(
                    "base namespace required for single mode".to_string(),
                ));
            }
            Ok(base.to_string())
        }
        NamespaceMode::PerApp => {
            if base.is_empty() {
                return Err(PreviewError::ConfigError(
                    "base namespace required for per-app mode".to_string(),
                ));
            }
            let suffix = base.strip_prefix('-').unwrap_or(base);
            Ok(format!("{}-{}", app, suffix))
        }
        NamespaceMode::PerPr => Ok(resource_name(app, pr_number)),
    }
}

pub fn image_tag(strategy: TagStrategy, pr_number: u64, sha: &str) -> String {
    match strategy {
        TagStrategy::Sha => sha.to_string(),
        TagStrategy::Pr => format!("pr-{}", pr_number),
        TagStrategy::PrSha => format!("pr-{}-{}", pr_number, short_sha(sha)),
    }
}

/// First seven characters of a commit SHA
pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

const PLACEHOLDERS: [&str; 3] = ["{app}", "{tag}", "{pr}"];

/// Substitute `{app}`, `{tag}` and `{pr}` in a single pass.
///
/// Substituted values are never scanned again, so an app name that happens
/// to contain `{tag}` is emitted literally.
pub fn render_template(template: &str, app: &str, tag: &str, pr_number: u64) -> Result<String> {
    if template.is_empty() {
        return Err(PreviewError::RenderError("template is empty".to_string()));
    }

    let pr = pr_number.to_string();
    let values = [app, tag, pr.as_str()];

    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let tail = &rest[start..];
        match PLACEHOLDERS.iter().position(|p| tail.starts_with(p)) {
            Some(idx) => {
                rendered.push_str(values[idx]);
                rest = &tail[PLACEHOLDERS[idx].len()..];
            }
            None => {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
    }
    rendered.push_str(rest);

    Ok(rendered)
}

/// Turn an `org/repo` name into a valid label value
pub fn sanitize_label_value(value: &str) -> String {
    let mapped: String = value
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '-',
        })
        .collect();

    let trimmed = mapped.trim_matches(|c| matches!(c, '-' | '_' | '.'));
    if trimmed.is_empty() {
        UNKNOWN_LABEL_VALUE.to_string()
    } else {
        trimmed.to_string()
    }
}
