//! Chat notifications. Delivery is fire-and-forget: callers log failures and
//! carry on.

mod report;

pub use report::Origin;
pub use report::Report;
pub use report::escape_html;
pub use report::machine_name;

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("telegram request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("telegram answered with HTTP {0}")]
    Status(reqwest::StatusCode),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), NotifyError>;
}

/// Used when no chat is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn send(&self, _report: &Report) -> Result<(), NotifyError> {
        tracing::debug!("no notification sink configured; dropping report");
        Ok(())
    }
}

#[derive(Clone)]
pub struct TelegramSink {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSink")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

impl TelegramSink {
    pub fn new(
        http: reqwest::Client,
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_base: api_base.into(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn send(&self, report: &Report) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        );
        let text = report.render_html();
        let response = self
            .http
            .post(&url)
            .timeout(SEND_TIMEOUT)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text: &text,
                parse_mode: "HTML",
            })
            .send()
            .await
            // The URL embeds the bot token.
            .map_err(|err| NotifyError::Http(err.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        Ok(())
    }
}

/// Sends `report`, logging instead of propagating failures.
pub async fn notify(sink: &dyn NotificationSink, report: &Report) -> bool {
    match sink.send(report).await {
        Ok(()) => {
            tracing::info!("report sent");
            true
        }
        Err(err) => {
            tracing::warn!("failed to send report: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_partial_json;
    use wiremock::matchers::method;
    use wiremock::matchers::path;

    fn report() -> Report {
        Report::Error {
            origin: Origin {
                identity: "7 / Back office".to_string(),
                machine: "POS-7".to_string(),
            },
            detail: "update check failed".to_string(),
        }
    }

    fn sink(server: &MockServer) -> TelegramSink {
        TelegramSink::new(reqwest::Client::new(), server.uri(), "123:abc", "-100")
    }

    #[tokio::test]
    async fn posts_html_message_to_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "-100",
                "parse_mode": "HTML",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        sink(&server).send(&report()).await.expect("send");

        let requests = server.received_requests().await.expect("recording");
        let body: serde_json::Value = requests[0].body_json().expect("json body");
        assert_eq!(body["text"], serde_json::json!(report().render_html()));
    }

    #[tokio::test]
    async fn rejected_message_is_reported_without_leaking_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = sink(&server).send(&report()).await.expect_err("401");
        assert!(matches!(err, NotifyError::Status(status) if status.as_u16() == 401));
        assert!(!err.to_string().contains("123:abc"));
        assert!(!notify(&sink(&server), &report()).await);
    }

    #[tokio::test]
    async fn unreachable_api_does_not_leak_token() {
        let sink = TelegramSink::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            "123:abc",
            "-100",
        );
        let err = sink.send(&report()).await.expect_err("connection refused");
        assert!(!format!("{err:?}").contains("123:abc"));
    }

    #[tokio::test]
    async fn noop_sink_accepts_everything() {
        assert!(notify(&NoopSink, &report()).await);
    }
}
