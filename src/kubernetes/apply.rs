// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Create-or-replace of namespaced objects.
//!
//! The live object is read first. When it exists the desired object is
//! written over it with the live `resourceVersion`, after copying any
//! server-assigned fields the caller wants kept. When it does not exist
//! the desired object is created.

use crate::error::Result;
use crate::types::Route;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::{
    api::{Api, PostParams},
    Resource, ResourceExt,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use tracing::{debug, info};

/// Create or replace `desired`. Returns true when the object was created.
///
/// `preserve` sees the live object and the desired one before the replace.
pub async fn apply<K, F>(api: &Api<K>, mut desired: K, preserve: F) -> Result<bool>
where
    K: Resource + Clone + DeserializeOwned + Serialize + Debug,
    F: FnOnce(&K, &mut K),
{
    let name = desired.name_any();

    match api.get(&name).await {
        Ok(live) => {
            desired.meta_mut().resource_version = live.resource_version();
            preserve(&live, &mut desired);
            api.replace(&name, &PostParams::default(), &desired).await?;
            debug!("Replaced {}", name);
            Ok(false)
        }
        Err(kube::Error::Api(err)) if err.code == 404 => {
            api.create(&PostParams::default(), &desired).await?;
            info!("Created {}", name);
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn apply_deployment(api: &Api<Deployment>, desired: Deployment) -> Result<bool> {
    apply(api, desired, |_, _| {}).await
}

pub async fn apply_service(api: &Api<Service>, desired: Service) -> Result<bool> {
    apply(api, desired, preserve_service_fields).await
}

pub async fn apply_route(api: &Api<Route>, desired: Route) -> Result<bool> {
    apply(api, desired, |_, _| {}).await
}

/// Keep the fields the API server assigns to a Service and refuses to change
fn preserve_service_fields(live: &Service, desired: &mut Service) {
    let (Some(live), Some(spec)) = (live.spec.as_ref(), desired.spec.as_mut()) else {
        return;
    };

    if spec.cluster_ip.as_deref().unwrap_or_default().is_empty() {
        spec.cluster_ip = live.cluster_ip.clone();
        spec.cluster_ips = live.cluster_ips.clone();
    }
    if spec.ip_families.is_none() {
        spec.ip_families = live.ip_families.clone();
    }
    if spec.ip_family_policy.is_none() {
        spec.ip_family_policy = live.ip_family_policy.clone();
    }

    let live_ports = live.ports.as_deref().unwrap_or_default();
    for port in spec.ports.iter_mut().flatten() {
        if port.node_port.is_some() {
            continue;
        }
        port.node_port = live_ports
            .iter()
            .find(|p| p.name == port.name)
            .and_then(|p| p.node_port);
    }
}
