// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for create-or-replace of preview objects and namespace management.

pub mod apply;
pub mod namespaces;

pub use apply::{apply, apply_deployment, apply_route, apply_service};
pub use namespaces::{delete_namespace, ensure_namespace_exists};
