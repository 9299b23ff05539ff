// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
pub mod build;
pub mod config;
pub mod constants;
pub mod error;
pub mod jobs;
pub mod kubernetes;
pub mod notify;
pub mod preview;
pub mod reconcilers;
pub mod types;
pub mod webhook;

#[cfg(test)]
pub mod test_utils;
