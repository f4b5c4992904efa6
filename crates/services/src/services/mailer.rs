//! Outbound mail seam. Production delivery goes through an HTTP mail API;
//! tests substitute their own implementations of the trait.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Mail API rejected the message with status {0}")]
    Rejected(u16),
    #[error("Mailer is not configured")]
    NotConfigured,
}

#[derive(Debug, Clone)]
pub struct OtpEmail {
    pub to: String,
    pub customer_name: String,
    pub task_code: String,
    pub code: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_verification_code(&self, email: &OtpEmail) -> Result<(), MailerError>;
}

/// Posts the message to a JSON mail relay (`FIELDOPS_MAIL_ENDPOINT`).
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

impl HttpMailer {
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("FIELDOPS_MAIL_ENDPOINT").ok()?;
        let from = std::env::var("FIELDOPS_MAIL_FROM")
            .unwrap_or_else(|_| "no-reply@fieldops.local".to_string());
        Some(Self {
            client: reqwest::Client::new(),
            endpoint,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_verification_code(&self, email: &OtpEmail) -> Result<(), MailerError> {
        let body = json!({
            "from": self.from,
            "to": email.to,
            "subject": format!("Verification code for task {}", email.task_code),
            "text": format!(
                "Hello {},\n\nYour verification code is {}. It expires in 10 minutes.\n",
                email.customer_name, email.code
            ),
        });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(MailerError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Development fallback when no relay is configured: the code goes to the
/// server log instead of an inbox.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification_code(&self, email: &OtpEmail) -> Result<(), MailerError> {
        tracing::info!(
            to = %mask_email(&email.to),
            task = %email.task_code,
            code = %email.code,
            "no mail relay configured; verification code logged"
        );
        Ok(())
    }
}

/// `ops@example.com` becomes `o**@example.com`; responses never echo the
/// full recipient address back to the field client.
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first = local.chars().next().unwrap_or('*');
            format!("{first}**@{domain}")
        }
        _ => "***".to_string(),
    }
}
