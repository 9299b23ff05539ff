// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Preview reconciler - upserts and deletes the objects of one preview.

use crate::constants::annotations;
use crate::error::{PreviewError, Result};
use crate::kubernetes::{apply_deployment, apply_route, apply_service, delete_namespace};
use crate::preview::resources::{
    build_deployment, build_route, build_service, preview_annotations, preview_selector,
};
use crate::preview::{NamespaceMode, PreviewConfig};
use crate::types::Route;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{DeleteParams, ListParams},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::{debug, info, instrument};

#[derive(Clone)]
pub struct Reconciler {
    client: Client,
}

impl Reconciler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Create or update the Deployment, Service and Route of a preview.
    /// Returns true when the preview did not exist before.
    pub async fn upsert_preview(&self, config: &PreviewConfig) -> Result<bool> {
        self.upsert_preview_at(config, Utc::now()).await
    }

    #[instrument(
        skip(self, config),
        fields(preview = %config.resource_name(), namespace = %config.namespace)
    )]
    pub async fn upsert_preview_at(
        &self,
        config: &PreviewConfig,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let namespace = config.namespace.as_str();
        let deployments: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let routes: Api<Route> = Api::namespaced(self.client.clone(), namespace);

        let created_at = match deployments.get(&config.resource_name()).await {
            Ok(existing) => existing.annotations().get(annotations::CREATED_AT).cloned(),
            Err(kube::Error::Api(err)) if err.code == 404 => None,
            Err(source) => {
                return Err(PreviewError::ApplyError {
                    kind: "Deployment",
                    source,
                })
            }
        };
        let annotations = preview_annotations(config, now, created_at.as_deref());

        let created = apply_deployment(&deployments, build_deployment(config, &annotations))
            .await
            .map_err(|e| apply_error("Deployment", e))?;
        apply_service(&services, build_service(config, &annotations))
            .await
            .map_err(|e| apply_error("Service", e))?;
        apply_route(&routes, build_route(config, &annotations))
            .await
            .map_err(|e| apply_error("Route", e))?;

        info!(
            "Preview {} {} at {}",
            config.resource_name(),
            if created { "created" } else { "updated" },
            config.route_host
        );
        Ok(created)
    }

    /// Delete every object labelled with the preview's identity. Under
    /// per-PR namespacing the namespace itself goes as well.
    #[instrument(skip(self, config), fields(namespace = %config.namespace, pr = config.pr_number))]
    pub async fn delete_preview(&self, config: &PreviewConfig, mode: NamespaceMode) -> Result<()> {
        let namespace = config.namespace.as_str();
        let selector = preview_selector(config);

        delete_labelled::<Deployment>(
            Api::namespaced(self.client.clone(), namespace),
            &selector,
            "Deployment",
        )
        .await?;
        delete_labelled::<Service>(
            Api::namespaced(self.client.clone(), namespace),
            &selector,
            "Service",
        )
        .await?;
        delete_labelled::<Route>(
            Api::namespaced(self.client.clone(), namespace),
            &selector,
            "Route",
        )
        .await?;

        if mode == NamespaceMode::PerPr {
            delete_namespace(&self.client, namespace).await?;
        }

        info!("Preview for PR #{} in {} deleted", config.pr_number, namespace);
        Ok(())
    }
}

fn apply_error(kind: &'static str, error: PreviewError) -> PreviewError {
    match error {
        PreviewError::KubeError(source) => PreviewError::ApplyError { kind, source },
        other => other,
    }
}

async fn delete_labelled<K>(api: Api<K>, selector: &str, kind: &'static str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let items = api
        .list(&ListParams::default().labels(selector))
        .await
        .map_err(|source| PreviewError::DeleteError { kind, source })?;

    for item in items.items {
        let name = item.name_any();
        match api.delete(&name, &DeleteParams::default()).await {
            Ok(_) => debug!("Deleted {} {}", kind, name),
            Err(kube::Error::Api(err)) if err.code == 404 => {
                debug!("{} {} already gone", kind, name)
            }
            Err(source) => return Err(PreviewError::DeleteError { kind, source }),
        }
    }

    Ok(())
}
