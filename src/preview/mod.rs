// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Preview environment model: naming, config resolution and desired state.

pub mod mapping;
pub mod naming;
pub mod resources;

use std::collections::BTreeMap;

pub use mapping::{resolve_preview_config, AppMapping, MappingFile};
pub use naming::{NamespaceMode, TagStrategy};

/// Fully resolved description of one preview environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewConfig {
    pub app_name: String,
    pub namespace: String,
    pub pr_number: u64,
    /// `org/repo`
    pub repo_full_name: String,
    pub image_ref: String,
    pub container_port: i32,
    pub route_host: String,
    pub route_path: String,
    pub head_sha: String,
    pub env: BTreeMap<String, String>,
}

impl PreviewConfig {
    /// Deterministic name of every object belonging to this preview
    pub fn resource_name(&self) -> String {
        naming::resource_name(&self.app_name, self.pr_number)
    }

    pub fn identity(&self) -> PreviewIdentity {
        PreviewIdentity {
            namespace: self.namespace.clone(),
            pr_number: self.pr_number,
            repo: naming::sanitize_label_value(&self.repo_full_name),
        }
    }
}

/// Durable key of a preview across time.
///
/// `repo` holds the sanitized label value, so identities computed from a
/// config and from live object labels compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewIdentity {
    pub namespace: String,
    pub pr_number: u64,
    pub repo: String,
}

impl PreviewIdentity {
    /// Minimal config that is enough to delete the preview
    pub fn deletion_config(&self) -> PreviewConfig {
        PreviewConfig {
            namespace: self.namespace.clone(),
            pr_number: self.pr_number,
            repo_full_name: self.repo.clone(),
            ..Default::default()
        }
    }
}
