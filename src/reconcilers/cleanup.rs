// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Stale preview cleanup - periodically deletes previews nobody touched
//! within the configured max age.

use crate::config::CleanupConfig;
use crate::constants::{annotations, labels};
use crate::error::{PreviewError, Result};
use crate::jobs::IdentityLocks;
use crate::preview::{NamespaceMode, PreviewIdentity};
use crate::reconcilers::Reconciler;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::{api::ListParams, Api, ResourceExt};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupResult {
    pub checked_deployments: usize,
    pub deleted_previews: usize,
    pub skipped_deployments: usize,
}

/// Identity of the preview a Deployment belongs to, from its labels
pub fn preview_identity_from_labels(
    namespace: &str,
    object_labels: &BTreeMap<String, String>,
) -> Option<PreviewIdentity> {
    if object_labels.get(labels::PREVIEW).map(String::as_str) != Some("true") {
        return None;
    }
    let pr_number = object_labels
        .get(labels::PR_NUMBER)?
        .parse::<u64>()
        .ok()
        .filter(|pr| *pr > 0)?;
    let repo = object_labels.get(labels::REPO).filter(|repo| !repo.is_empty())?;
    if namespace.is_empty() {
        return None;
    }

    Some(PreviewIdentity {
        namespace: namespace.to_string(),
        pr_number,
        repo: repo.clone(),
    })
}

/// When a preview was last touched: `last-updated-at`, else `created-at`,
/// else `fallback`. Unparseable annotations are ignored.
pub fn last_touched_at(
    object_annotations: &BTreeMap<String, String>,
    fallback: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    [annotations::LAST_UPDATED_AT, annotations::CREATED_AT]
        .iter()
        .filter_map(|key| object_annotations.get(*key))
        .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|time| time.with_timezone(&Utc))
        .or(fallback)
}

/// How long ago the preview owning `deployment` was last touched
fn idle_for(deployment: &Deployment, now: DateTime<Utc>) -> Option<Duration> {
    let created = deployment.creation_timestamp().map(|time| time.0);
    let touched = last_touched_at(deployment.annotations(), created)?;
    Some(now.signed_duration_since(touched).to_std().unwrap_or_default())
}

/// One cleanup pass over all preview Deployments in the cluster.
///
/// Previews a worker is busy with are skipped until the next pass. A
/// Deployment that looked stale in the listing is read again once its lock
/// is held, and left alone if it was refreshed or removed in between.
#[instrument(skip(reconciler, locks))]
pub async fn cleanup_stale_previews(
    reconciler: &Reconciler,
    locks: &IdentityLocks,
    mode: NamespaceMode,
    max_age: Duration,
    now: DateTime<Utc>,
) -> Result<CleanupResult> {
    let deployments: Api<Deployment> = Api::all(reconciler.client().clone());
    let list = deployments
        .list(&ListParams::default().labels(&format!("{}=true", labels::PREVIEW)))
        .await?;

    let mut result = CleanupResult {
        checked_deployments: list.items.len(),
        ..Default::default()
    };
    let mut seen = HashSet::new();

    for deployment in &list.items {
        let namespace = deployment.namespace().unwrap_or_default();
        let Some(identity) = preview_identity_from_labels(&namespace, deployment.labels()) else {
            debug!("Skipping {}/{}: incomplete preview labels", namespace, deployment.name_any());
            result.skipped_deployments += 1;
            continue;
        };

        let Some(age) = idle_for(deployment, now) else {
            result.skipped_deployments += 1;
            continue;
        };
        if age <= max_age || !seen.insert(identity.clone()) {
            continue;
        }

        let Some(_guard) = locks.try_acquire(&identity) else {
            debug!("Skipping {}/{}: preview is busy", namespace, deployment.name_any());
            result.skipped_deployments += 1;
            continue;
        };

        let current = Api::<Deployment>::namespaced(reconciler.client().clone(), &namespace)
            .get_opt(&deployment.name_any())
            .await?;
        let Some(age) = current.as_ref().and_then(|current| idle_for(current, now)) else {
            continue;
        };
        if age <= max_age {
            debug!("Keeping {}/{}: refreshed since listing", namespace, deployment.name_any());
            continue;
        }

        info!(
            "Deleting stale preview {} PR #{} in {} (idle for {}h)",
            identity.repo,
            identity.pr_number,
            identity.namespace,
            age.as_secs() / 3600
        );
        reconciler
            .delete_preview(&identity.deletion_config(), mode)
            .await?;
        result.deleted_previews += 1;
    }

    Ok(result)
}

/// Runs cleanup passes until cancelled
pub struct StaleCleaner {
    reconciler: Reconciler,
    locks: IdentityLocks,
    mode: NamespaceMode,
    config: CleanupConfig,
    timeout: Duration,
}

impl StaleCleaner {
    pub fn new(
        reconciler: Reconciler,
        locks: IdentityLocks,
        mode: NamespaceMode,
        config: CleanupConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            reconciler,
            locks,
            mode,
            config,
            timeout,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Stale preview cleanup every {}m, max age {}h",
            self.config.interval.as_secs() / 60,
            self.config.max_age.as_secs() / 3600
        );

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(self.config.initial_delay) => {}
        }

        let mut ticker = tokio::time::interval(self.config.interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Stale preview cleanup stopped");
                    return;
                }
                _ = ticker.tick() => self.run_once().await,
            }
        }
    }

    async fn run_once(&self) {
        let pass = cleanup_stale_previews(
            &self.reconciler,
            &self.locks,
            self.mode,
            self.config.max_age,
            Utc::now(),
        );

        match tokio::time::timeout(self.timeout, pass).await {
            Ok(Ok(result)) => info!(
                "Cleanup pass done: checked {}, deleted {}, skipped {}",
                result.checked_deployments, result.deleted_previews, result.skipped_deployments
            ),
            Ok(Err(e)) => error!("Cleanup pass failed: {}", e),
            Err(_) => warn!(
                "{}",
                PreviewError::Timeout {
                    stage: "cleanup",
                    timeout: self.timeout,
                }
            ),
        }
    }
}
