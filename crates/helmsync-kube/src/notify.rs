//! Run notifications
//!
//! Results and fatal errors can be posted to a Slack-compatible incoming
//! webhook.

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::Result;

const COLOR_SUCCESS: &str = "#36a64f";
const COLOR_FAILURE: &str = "#FF0000";

/// Delivers a message to an endpoint
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `message` to `url`. Returns whether it was delivered.
    async fn notify(&self, message: &str, url: &str, is_failure: bool) -> bool;
}

/// Posts Slack attachments to an incoming webhook
pub struct SlackNotifier {
    client: reqwest::Client,
}

impl SlackNotifier {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }

    /// Post and report transport errors
    pub async fn post(&self, message: &str, url: &str, is_failure: bool) -> Result<bool> {
        let payload = slack_payload(message, is_failure, chrono::Utc::now().timestamp());
        let response = self.client.post(url).json(&payload).send().await?;
        Ok(response.status() == reqwest::StatusCode::OK)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, message: &str, url: &str, is_failure: bool) -> bool {
        tracing::info!("posting notification to slack");
        match self.post(message, url, is_failure).await {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::warn!("while sending notification to slack: {}", e);
                false
            }
        }
    }
}

/// Slack message body for `message`
pub fn slack_payload(message: &str, is_failure: bool, timestamp: i64) -> Value {
    let color = if is_failure { COLOR_FAILURE } else { COLOR_SUCCESS };
    let pretext = if message.is_empty() {
        "No actions to perform!"
    } else if is_failure {
        "Failed to reconcile the desired state: "
    } else {
        "Here is what I have done: "
    };

    json!({
        "attachments": [{
            "fallback": "helmsync results.",
            "color": color,
            "pretext": pretext,
            "title": message,
            "footer": format!("helmsync {}", env!("CARGO_PKG_VERSION")),
            "ts": timestamp,
        }]
    })
}
