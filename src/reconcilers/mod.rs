// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconcilers that converge the cluster onto the desired preview state.

pub mod cleanup;
pub mod preview;

pub use cleanup::{cleanup_stale_previews, CleanupResult, StaleCleaner};
pub use preview::Reconciler;
