// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed custom resources that are not part of k8s-openapi.

pub mod route;

pub use route::{Route, RoutePort, RouteSpec, RouteTargetReference};
