// Outbound email boundary.
// Decision: Delivery goes through an HTTP relay endpoint when configured;
// without one, messages are logged and dropped so local runs keep working.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// Build a mailer from EMAIL_RELAY_URL / EMAIL_FROM.
pub fn from_env() -> Arc<dyn Mailer> {
    let from =
        std::env::var("EMAIL_FROM").unwrap_or_else(|_| "hello@wayfarer.example".to_string());

    match std::env::var("EMAIL_RELAY_URL") {
        Ok(url) if !url.is_empty() => {
            tracing::info!(relay = %url, "Email relay configured");
            Arc::new(RelayMailer {
                client: reqwest::Client::new(),
                endpoint: url,
                from,
            })
        }
        _ => {
            tracing::warn!("EMAIL_RELAY_URL not set, outgoing email will only be logged");
            Arc::new(LogMailer)
        }
    }
}

/// Sends mail by POSTing to an HTTP relay endpoint.
pub struct RelayMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

#[derive(Serialize)]
struct RelayMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&RelayMessage {
                from: &self.from,
                to,
                subject,
                text: body,
            })
            .send()
            .await
            .context("Failed to reach email relay")?;

        if !response.status().is_success() {
            anyhow::bail!("Email relay returned {}", response.status());
        }

        tracing::debug!(to = %to, subject = %subject, "Email sent");
        Ok(())
    }
}

/// Development fallback: log instead of sending.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<()> {
        tracing::info!(to = %to, subject = %subject, "Email suppressed (no relay configured)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let mailer = LogMailer;
        assert!(mailer
            .send("user@example.com", "Subject", "Body")
            .await
            .is_ok());
    }
}
