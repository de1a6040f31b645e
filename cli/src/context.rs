use anyhow::Context;
use remotehand_config::Config;
use remotehand_notify::NoopSink;
use remotehand_notify::NotificationSink;
use remotehand_notify::Origin;
use remotehand_notify::Report;
use remotehand_notify::TelegramSink;
use remotehand_notify::notify;
use remotehand_updater::build_http_client;
use std::sync::Arc;

/// Objects built once at startup and shared by the subcommands.
pub struct AppContext {
    pub config: Config,
    pub sink: Arc<dyn NotificationSink>,
}

impl AppContext {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let sink: Arc<dyn NotificationSink> = match &config.telegram {
            Some(telegram) => Arc::new(TelegramSink::new(
                build_http_client().context("building HTTP client")?,
                telegram.api_base.clone(),
                telegram.token.clone(),
                telegram.chat_id.clone(),
            )),
            None => {
                tracing::info!("telegram is not configured; reports will be dropped");
                Arc::new(NoopSink)
            }
        };
        Ok(Self { config, sink })
    }

    pub fn with_sink(config: Config, sink: Arc<dyn NotificationSink>) -> Self {
        Self { config, sink }
    }

    pub fn origin(&self) -> Origin {
        Origin::new(self.config.identity())
    }

    pub async fn report(&self, report: Report) -> bool {
        notify(self.sink.as_ref(), &report).await
    }

    pub async fn report_error(&self, detail: impl Into<String>) -> bool {
        self.report(Report::Error {
            origin: self.origin(),
            detail: detail.into(),
        })
        .await
    }
}
