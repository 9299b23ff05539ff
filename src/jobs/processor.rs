// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Runs the stages of one preview job.

use crate::build::ImageBuilder;
use crate::config::Timeouts;
use crate::error::{PreviewError, Result};
use crate::jobs::{IdentityLocks, PreviewJob};
use crate::kubernetes::ensure_namespace_exists;
use crate::notify::{preview_message, Notifier};
use crate::preview::NamespaceMode;
use crate::reconcilers::Reconciler;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

pub struct JobProcessor {
    reconciler: Reconciler,
    builder: Arc<dyn ImageBuilder>,
    notifiers: Vec<Arc<dyn Notifier>>,
    locks: IdentityLocks,
    timeouts: Timeouts,
}

impl JobProcessor {
    pub fn new(
        reconciler: Reconciler,
        builder: Arc<dyn ImageBuilder>,
        notifiers: Vec<Arc<dyn Notifier>>,
        locks: IdentityLocks,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            reconciler,
            builder,
            notifiers,
            locks,
            timeouts,
        }
    }

    /// Run one job to completion. Stages run strictly in order and the
    /// first failing stage ends the job.
    #[instrument(
        skip(self, job),
        fields(
            action = %job.action,
            repo = %job.config.repo_full_name,
            pr = job.config.pr_number
        )
    )]
    pub async fn process(&self, job: PreviewJob) -> Result<()> {
        let _guard = self.locks.acquire(&job.config.identity()).await;

        if !job.action.is_upsert() {
            return with_timeout(
                "delete",
                self.timeouts.reconcile,
                self.reconciler.delete_preview(&job.config, job.namespace_mode),
            )
            .await;
        }

        let config = &job.config;
        if let (Some(build), Some(clone_url)) = (&job.build, &job.clone_url) {
            info!("Building {}", config.image_ref);
            with_timeout(
                "build",
                self.timeouts.build,
                self.builder
                    .build(clone_url, &config.head_sha, &config.image_ref, build),
            )
            .await?;
        }

        if job.namespace_mode != NamespaceMode::Single {
            with_timeout(
                "namespace",
                self.timeouts.reconcile,
                ensure_namespace_exists(self.reconciler.client(), &config.namespace),
            )
            .await?;
        }

        let created = with_timeout(
            "reconcile",
            self.timeouts.reconcile,
            self.reconciler.upsert_preview(config),
        )
        .await?;

        let text = preview_message(config, &job.pull_request, created);
        for notifier in &self.notifiers {
            let sent = with_timeout("notify", self.timeouts.notify, notifier.send(config, &text)).await;
            if let Err(e) = sent {
                warn!("{} notification failed: {}", notifier.name(), e);
            }
        }

        Ok(())
    }
}

async fn with_timeout<T, F>(stage: &'static str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| PreviewError::Timeout { stage, timeout })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildConfig;
    use crate::jobs::tests::make_job;
    use crate::jobs::PreviewAction;
    use crate::preview::PreviewConfig;
    use crate::test_utils::{deployment_path, namespace_path, FakeApiServer};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBuilder {
        fail: bool,
        delay: Option<Duration>,
        builds: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageBuilder for FakeBuilder {
        async fn build(
            &self,
            _clone_url: &str,
            _sha: &str,
            image_ref: &str,
            _config: &BuildConfig,
        ) -> Result<()> {
            self.builds.lock().unwrap().push(image_ref.to_string());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(PreviewError::BuildError("docker build failed".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn send(&self, _config: &PreviewConfig, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(PreviewError::NotifyError("unreachable".to_string()));
            }
            Ok(())
        }
    }

    fn processor(
        server: &FakeApiServer,
        builder: Arc<FakeBuilder>,
        notifiers: Vec<Arc<dyn Notifier>>,
        timeouts: Timeouts,
    ) -> JobProcessor {
        JobProcessor::new(
            Reconciler::new(server.client()),
            builder,
            notifiers,
            IdentityLocks::new(),
            timeouts,
        )
    }

    fn with_build(mut job: PreviewJob) -> PreviewJob {
        job.clone_url = Some("https://github.com/acme/web.git".to_string());
        job.build = Some(BuildConfig::default());
        job
    }

    #[tokio::test]
    async fn test_upsert_then_notify() {
        let server = FakeApiServer::new();
        let builder = Arc::new(FakeBuilder::default());
        let notifier = Arc::new(FakeNotifier::default());
        let processor = processor(
            &server,
            builder.clone(),
            vec![notifier.clone() as Arc<dyn Notifier>],
            Timeouts::default(),
        );

        processor
            .process(with_build(make_job(PreviewAction::Opened, 3)))
            .await
            .unwrap();

        assert_eq!(*builder.builds.lock().unwrap(), vec!["registry/web:pr-3"]);
        assert!(server.contains(&deployment_path("previews", "web-pr-3")));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("Preview deployed for acme/web#3"));
    }

    #[tokio::test]
    async fn test_build_failure_skips_reconcile() {
        let server = FakeApiServer::new();
        let notifier = Arc::new(FakeNotifier::default());
        let processor = processor(
            &server,
            Arc::new(FakeBuilder {
                fail: true,
                ..Default::default()
            }),
            vec![notifier.clone() as Arc<dyn Notifier>],
            Timeouts::default(),
        );

        let result = processor
            .process(with_build(make_job(PreviewAction::Synchronize, 3)))
            .await;

        assert!(matches!(result, Err(PreviewError::BuildError(_))));
        assert!(server.requests().is_empty());
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_timeout() {
        let server = FakeApiServer::new();
        let processor = processor(
            &server,
            Arc::new(FakeBuilder {
                delay: Some(Duration::from_secs(5)),
                ..Default::default()
            }),
            vec![],
            Timeouts {
                build: Duration::from_millis(20),
                ..Default::default()
            },
        );

        let result = processor
            .process(with_build(make_job(PreviewAction::Opened, 3)))
            .await;

        assert!(matches!(result, Err(PreviewError::Timeout { stage: "build", .. })));
        assert!(server.requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_build_without_build_settings() {
        let server = FakeApiServer::new();
        let builder = Arc::new(FakeBuilder::default());
        let processor = processor(
            &server,
            builder.clone(),
            vec![],
            Timeouts::default(),
        );

        processor
            .process(make_job(PreviewAction::Opened, 3))
            .await
            .unwrap();
        assert!(builder.builds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_job() {
        let server = FakeApiServer::new();
        let processor = processor(
            &server,
            Arc::new(FakeBuilder::default()),
            vec![Arc::new(FakeNotifier {
                fail: true,
                ..Default::default()
            }) as Arc<dyn Notifier>],
            Timeouts::default(),
        );

        processor
            .process(make_job(PreviewAction::Opened, 3))
            .await
            .unwrap();
        assert!(server.contains(&deployment_path("previews", "web-pr-3")));
    }

    #[tokio::test]
    async fn test_per_app_mode_ensures_namespace() {
        let server = FakeApiServer::new();
        let processor = processor(
            &server,
            Arc::new(FakeBuilder::default()),
            vec![],
            Timeouts::default(),
        );

        let mut job = make_job(PreviewAction::Opened, 3);
        job.namespace_mode = NamespaceMode::PerApp;
        job.config.namespace = "previews-web".to_string();
        processor.process(job).await.unwrap();

        assert!(server.contains(&namespace_path("previews-web")));
        assert!(server.contains(&deployment_path("previews-web", "web-pr-3")));
    }

    #[tokio::test]
    async fn test_closed_deletes_preview() {
        let server = FakeApiServer::new();
        let processor = processor(
            &server,
            Arc::new(FakeBuilder::default()),
            vec![],
            Timeouts::default(),
        );

        processor
            .process(make_job(PreviewAction::Opened, 3))
            .await
            .unwrap();
        processor
            .process(make_job(PreviewAction::Closed, 3))
            .await
            .unwrap();

        assert!(!server.contains(&deployment_path("previews", "web-pr-3")));
    }
}
