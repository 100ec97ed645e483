//! Mailjet v3 notifier

use crate::config::NotifyConfig;
use crate::notify::{Notifier, NotifyError};
use crate::report::JobReport;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const MAILJET_KEY_VAR: &str = "MAILJET_KEY";
pub const MAILJET_SECRET_VAR: &str = "MAILJET_SECRET";

/// Mailjet v3 send request
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(rename = "FromEmail")]
    from_email: &'a str,
    #[serde(rename = "FromName")]
    from_name: &'a str,
    #[serde(rename = "Subject")]
    subject: &'a str,
    #[serde(rename = "Html-part")]
    html_part: String,
    #[serde(rename = "Recipients")]
    recipients: Vec<SendRecipient<'a>>,
}

#[derive(Debug, Serialize)]
struct SendRecipient<'a> {
    #[serde(rename = "Email")]
    email: &'a str,
    #[serde(rename = "Name", skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Sends result summaries through Mailjet
pub struct MailjetNotifier {
    config: NotifyConfig,
    api_key: String,
    api_secret: String,
    client: Client,
}

impl MailjetNotifier {
    pub fn new(
        config: NotifyConfig,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            config,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            client,
        })
    }

    /// Builds a notifier with credentials from `MAILJET_KEY` and `MAILJET_SECRET`
    pub fn from_env(config: Option<&NotifyConfig>) -> Result<Self, NotifyError> {
        let config = config
            .cloned()
            .ok_or_else(|| NotifyError::NotConfigured("no [notify] section".to_string()))?;
        let api_key =
            std::env::var(MAILJET_KEY_VAR).map_err(|_| NotifyError::MissingCredential(MAILJET_KEY_VAR))?;
        let api_secret = std::env::var(MAILJET_SECRET_VAR)
            .map_err(|_| NotifyError::MissingCredential(MAILJET_SECRET_VAR))?;
        Self::new(config, api_key, api_secret)
    }
}

#[async_trait]
impl Notifier for MailjetNotifier {
    async fn notify(&self, reports: &[JobReport]) -> Result<(), NotifyError> {
        if self.config.recipients.is_empty() {
            return Err(NotifyError::NotConfigured("no recipients".to_string()));
        }

        let request = SendRequest {
            from_email: &self.config.from_email,
            from_name: &self.config.from_name,
            subject: &self.config.subject,
            html_part: render_html(reports),
            recipients: self
                .config
                .recipients
                .iter()
                .map(|r| SendRecipient {
                    email: &r.email,
                    name: r.name.as_deref(),
                })
                .collect(),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!("Email sent to {} recipients", self.config.recipients.len());
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders reports as an HTML table
pub fn render_html(reports: &[JobReport]) -> String {
    let mut html = String::from(
        "<h3>Latest scraping results</h3>\n<table>\n<tr><th>Company</th><th>Date</th><th>Count</th><th>Error</th></tr>\n",
    );

    for report in reports {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape(&report.label),
            report.timestamp.format("%Y-%m-%d %H:%M"),
            report.total_display(),
            report
                .error
                .as_ref()
                .map(|e| escape(&e.to_string()))
                .unwrap_or_default(),
        ));
    }

    html.push_str("</table>\n");
    html
}
