// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Static repository → app mapping and resolution of a `PreviewConfig`.

use crate::config::PreviewSettings;
use crate::error::{PreviewError, Result};
use crate::preview::naming::{image_tag, namespace_for_mode, render_template};
use crate::preview::PreviewConfig;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

/// How a repository is deployed as a preview
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppMapping {
    pub app_name: String,
    #[serde(default)]
    pub container_port: Option<i32>,
    #[serde(default)]
    pub route_path: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Mapping of `org/repo` to its app definition
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct MappingFile(HashMap<String, AppMapping>);

impl MappingFile {
    /// Load a mapping file. JSON is accepted as a subset of YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PreviewError::MappingError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mapping = Self::parse(&raw)?;
        info!(
            "Loaded app mapping for {} repositories from {}",
            mapping.0.len(),
            path.display()
        );
        Ok(mapping)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let mapping: MappingFile = serde_yaml::from_str(raw)
            .map_err(|e| PreviewError::MappingError(format!("failed to parse: {}", e)))?;

        for (repo, app) in &mapping.0 {
            if app.app_name.trim().is_empty() {
                return Err(PreviewError::MappingError(format!(
                    "repository {} has an empty appName",
                    repo
                )));
            }
        }

        Ok(mapping)
    }

    pub fn get(&self, repo_full_name: &str) -> Option<&AppMapping> {
        self.0.get(repo_full_name)
    }
}

/// Resolve the preview of one PR from the static mapping and the templates
pub fn resolve_preview_config(
    settings: &PreviewSettings,
    app: &AppMapping,
    repo_full_name: &str,
    pr_number: u64,
    head_sha: &str,
) -> Result<PreviewConfig> {
    if pr_number == 0 {
        return Err(PreviewError::RenderError(
            "pull request number must be positive".to_string(),
        ));
    }
    if app.app_name.is_empty() {
        return Err(PreviewError::RenderError(format!(
            "no app name mapped for {}",
            repo_full_name
        )));
    }

    let tag = image_tag(settings.tag_strategy, pr_number, head_sha);
    let image_ref = render_template(&settings.image_template, &app.app_name, &tag, pr_number)?;
    let route_host = render_template(&settings.route_template, &app.app_name, &tag, pr_number)?;
    let namespace = namespace_for_mode(
        settings.namespace_mode,
        &settings.base_namespace,
        &app.app_name,
        pr_number,
    )?;

    Ok(PreviewConfig {
        app_name: app.app_name.clone(),
        namespace,
        pr_number,
        repo_full_name: repo_full_name.to_string(),
        image_ref,
        container_port: app.container_port.unwrap_or(settings.default_port),
        route_host,
        route_path: app.route_path.clone().unwrap_or_default(),
        head_sha: head_sha.to_string(),
        env: app.env.clone(),
    })
}
