// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired state of the Deployment, Service and Route of a preview.

use crate::constants::{annotations, labels, SERVICE_PORT, SERVICE_PORT_NAME};
use crate::preview::naming::sanitize_label_value;
use crate::preview::PreviewConfig;
use crate::types::{Route, RoutePort, RouteSpec, RouteTargetReference};
use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, PodSpec, PodTemplateSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;

/// Format a timestamp the way preview annotations store it
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Labels shared by every object of a preview
pub fn preview_labels(config: &PreviewConfig) -> BTreeMap<String, String> {
    BTreeMap::from([
        (labels::NAME.to_string(), config.app_name.clone()),
        (labels::INSTANCE.to_string(), config.resource_name()),
        (labels::PREVIEW.to_string(), "true".to_string()),
        (labels::PR_NUMBER.to_string(), config.pr_number.to_string()),
        (
            labels::REPO.to_string(),
            sanitize_label_value(&config.repo_full_name),
        ),
    ])
}

/// Selector matching every object of a preview, independent of its name
pub fn preview_selector(config: &PreviewConfig) -> String {
    format!(
        "{}=true,{}={},{}={}",
        labels::PREVIEW,
        labels::PR_NUMBER,
        config.pr_number,
        labels::REPO,
        sanitize_label_value(&config.repo_full_name)
    )
}

/// Age-tracking annotations. `created_at` is carried over from an existing
/// preview when known, so it never moves once set.
pub fn preview_annotations(
    config: &PreviewConfig,
    now: DateTime<Utc>,
    created_at: Option<&str>,
) -> BTreeMap<String, String> {
    let now = format_timestamp(now);
    let created_at = created_at
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| now.clone());

    BTreeMap::from([
        (annotations::HEAD_SHA.to_string(), config.head_sha.clone()),
        (annotations::LAST_UPDATED_AT.to_string(), now),
        (annotations::CREATED_AT.to_string(), created_at),
    ])
}

fn object_meta(config: &PreviewConfig, annotations: &BTreeMap<String, String>) -> ObjectMeta {
    ObjectMeta {
        name: Some(config.resource_name()),
        namespace: Some(config.namespace.clone()),
        labels: Some(preview_labels(config)),
        annotations: Some(annotations.clone()),
        ..Default::default()
    }
}

pub fn build_deployment(config: &PreviewConfig, annotations: &BTreeMap<String, String>) -> Deployment {
    let labels = preview_labels(config);

    // BTreeMap iteration keeps the env list sorted by name, so identical
    // configs produce identical specs.
    let env: Vec<EnvVar> = config
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect();

    Deployment {
        metadata: object_meta(config, annotations),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: config.app_name.clone(),
                        image: Some(config.image_ref.clone()),
                        ports: Some(vec![ContainerPort {
                            container_port: config.container_port,
                            ..Default::default()
                        }]),
                        env: (!env.is_empty()).then_some(env),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn build_service(config: &PreviewConfig, annotations: &BTreeMap<String, String>) -> Service {
    Service {
        metadata: object_meta(config, annotations),
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(preview_labels(config)),
            ports: Some(vec![ServicePort {
                name: Some(SERVICE_PORT_NAME.to_string()),
                port: SERVICE_PORT,
                target_port: Some(IntOrString::Int(config.container_port)),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn build_route(config: &PreviewConfig, annotations: &BTreeMap<String, String>) -> Route {
    let name = config.resource_name();
    let mut route = Route::new(
        &name,
        RouteSpec {
            host: config.route_host.clone(),
            path: (!config.route_path.is_empty()).then(|| config.route_path.clone()),
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: name.clone(),
            },
            port: Some(RoutePort {
                target_port: SERVICE_PORT_NAME.to_string(),
            }),
        },
    );
    route.metadata = object_meta(config, annotations);
    route
}
