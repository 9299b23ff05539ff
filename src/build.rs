// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Container image builds for previews.
//!
//! The Docker builder fetches exactly one commit into a scratch directory,
//! builds the image and pushes it, then removes the local copy of the image.

use crate::error::{PreviewError, Result};
use async_trait::async_trait;
use std::path::Path;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, instrument};
use url::Url;

const REDACTED: &str = "REDACTED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Path of the Dockerfile relative to the repository root
    pub dockerfile: String,
    pub platform: String,
    pub use_buildx: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dockerfile: "Dockerfile".to_string(),
            platform: "linux/amd64".to_string(),
            use_buildx: false,
        }
    }
}

#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build the image for `sha` of `clone_url` and push it as `image_ref`
    async fn build(
        &self,
        clone_url: &str,
        sha: &str,
        image_ref: &str,
        config: &BuildConfig,
    ) -> Result<()>;
}

/// Builds with the local `git` and `docker` binaries
pub struct DockerBuilder {
    github_token: Option<String>,
}

impl DockerBuilder {
    pub fn new(github_token: Option<String>) -> Self {
        Self {
            github_token: github_token.filter(|t| !t.is_empty()),
        }
    }

    async fn run(&self, dir: &Path, program: &str, args: &[String]) -> Result<()> {
        debug!("Running {} {}", program, self.redact(&args.join(" ")));
        let output = Command::new(program)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PreviewError::BuildError(format!("failed to start {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PreviewError::BuildError(self.redact(&format!(
                "{} {} failed ({}): {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            ))));
        }
        Ok(())
    }

    fn redact(&self, text: &str) -> String {
        match &self.github_token {
            Some(token) => text.replace(token.as_str(), REDACTED),
            None => text.to_string(),
        }
    }
}

#[async_trait]
impl ImageBuilder for DockerBuilder {
    #[instrument(skip(self, clone_url, config))]
    async fn build(
        &self,
        clone_url: &str,
        sha: &str,
        image_ref: &str,
        config: &BuildConfig,
    ) -> Result<()> {
        for (value, what) in [(clone_url, "clone url"), (sha, "sha"), (image_ref, "image ref")] {
            if value.is_empty() {
                return Err(PreviewError::BuildError(format!("{} is empty", what)));
            }
        }

        let remote = clone_url_with_token(clone_url, self.github_token.as_deref())?;
        let workdir = scratch_dir()?;
        let dir = workdir.path();

        for args in [
            vec!["init".to_string()],
            vec!["remote".into(), "add".into(), "origin".into(), remote],
            vec!["fetch".into(), "--depth".into(), "1".into(), "origin".into(), sha.to_string()],
            vec!["checkout".into(), "FETCH_HEAD".into()],
        ] {
            self.run(dir, "git", &args).await?;
        }

        let dockerfile = dir.join(&config.dockerfile);
        if !tokio::fs::try_exists(&dockerfile).await.unwrap_or(false) {
            return Err(PreviewError::BuildError(format!(
                "dockerfile not found at {}",
                config.dockerfile
            )));
        }

        for args in docker_steps(image_ref, &dockerfile, config) {
            self.run(dir, "docker", &args).await?;
        }

        info!("Built and pushed {}", image_ref);
        Ok(())
    }
}

/// The docker invocations that build, push and then drop the local image
fn docker_steps(image_ref: &str, dockerfile: &Path, config: &BuildConfig) -> Vec<Vec<String>> {
    let dockerfile = dockerfile.display().to_string();
    let owned = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();

    let mut steps = if config.use_buildx {
        vec![owned(&[
            "buildx",
            "build",
            "--push",
            "--tag",
            image_ref,
            "--platform",
            config.platform.as_str(),
            "-f",
            dockerfile.as_str(),
            ".",
        ])]
    } else {
        vec![
            owned(&["build", "-f", dockerfile.as_str(), "-t", image_ref, "."]),
            owned(&["push", image_ref]),
        ]
    };
    steps.push(owned(&["image", "rm", "-f", image_ref]));
    steps
}

/// Embed a GitHub token into an https clone URL
pub fn clone_url_with_token(clone_url: &str, token: Option<&str>) -> Result<String> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(clone_url.to_string());
    };

    let mut url = Url::parse(clone_url)
        .map_err(|e| PreviewError::BuildError(format!("invalid clone url: {}", e)))?;
    if url.scheme() != "https" {
        return Ok(clone_url.to_string());
    }

    url.set_username("x-access-token")
        .and_then(|_| url.set_password(Some(token)))
        .map_err(|_| PreviewError::BuildError("clone url cannot carry credentials".to_string()))?;
    Ok(url.to_string())
}

/// Working directory of one build, removed when dropped
fn scratch_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("preview-build-")
        .tempdir()
        .map_err(|e| PreviewError::BuildError(format!("failed to create build dir: {}", e)))
}
