// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Label keys attached to every managed preview object
pub mod labels {
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const INSTANCE: &str = "app.kubernetes.io/instance";
    /// Always "true" on preview objects; the cleanup scanner selects on it
    pub const PREVIEW: &str = "preview-controller/preview";
    pub const PR_NUMBER: &str = "preview-controller/pr";
    /// Sanitized `org/repo`
    pub const REPO: &str = "preview-controller/repo";
}

/// Annotation keys used to track preview age
pub mod annotations {
    /// Set on first upsert and never changed afterwards
    pub const CREATED_AT: &str = "preview-controller/created-at";
    /// Refreshed on every successful upsert
    pub const LAST_UPDATED_AT: &str = "preview-controller/last-updated-at";
    pub const HEAD_SHA: &str = "preview-controller/head-sha";
}

/// Placeholder label value when a repository name sanitizes to nothing
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

/// Port the preview Service exposes; routed to the container port
pub const SERVICE_PORT: i32 = 80;
pub const SERVICE_PORT_NAME: &str = "http";

/// Webhook request handling
pub mod webhook {
    pub const EVENT_HEADER: &str = "X-GitHub-Event";
    pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
    pub const SIGNATURE_PREFIX: &str = "sha256=";
    pub const PULL_REQUEST_EVENT: &str = "pull_request";
    pub const MAX_BODY_BYTES: usize = 2 << 20;
}

/// User agent for outbound GitHub/Slack requests
pub const USER_AGENT: &str = "preview-controller";
