//! Invitation mail delivery
//!
//! The registration workflow hands a rendered [`InvitationEmail`] to a
//! [`Mailer`] once the account and its invitation are committed. Delivery
//! goes through the SendGrid v3 API when a key is configured and is only
//! logged otherwise.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::config::MailConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Mail delivery failure
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider rejected the message with HTTP {0}")]
    Rejected(u16),
}

/// Invitation addressed to a freshly registered user
#[derive(Clone, PartialEq, Eq)]
pub struct InvitationEmail {
    pub username: String,
    pub email: String,
    /// Carries the raw token; never log it
    pub activation_url: String,
}

impl InvitationEmail {
    pub fn new(username: &str, email: &str, activation_base_url: &str, raw_token: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            activation_url: format!("{}/{}", activation_base_url.trim_end_matches('/'), raw_token),
        }
    }

    pub fn subject(&self, from_name: &str) -> String {
        format!("Finish your registration with {from_name}")
    }

    pub fn body(&self, from_name: &str) -> String {
        format!(
            "Hi {username},\n\n\
             Thanks for signing up for {from_name}. Confirm your email address \
             to activate your account:\n\n\
             {url}\n\n\
             If you did not sign up, you can ignore this message.\n\n\
             The {from_name} team\n",
            username = self.username,
            url = self.activation_url,
        )
    }
}

impl fmt::Debug for InvitationEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvitationEmail")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("activation_url", &"<redacted>")
            .finish()
    }
}

/// Outbound mail transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one invitation, returning the provider's HTTP status
    async fn send(&self, email: &InvitationEmail) -> Result<u16, MailError>;
}

/// Pick the transport for the configured mail section
///
/// # Errors
/// Returns error if the HTTP client cannot be built
pub fn from_config(config: &MailConfig) -> Result<Arc<dyn Mailer>, MailError> {
    match config.api_key.as_deref().filter(|key| !key.is_empty()) {
        Some(api_key) => Ok(Arc::new(SendGridMailer::new(config, api_key)?)),
        None => {
            tracing::warn!("mail.api_key is not set; invitation emails will only be logged");
            Ok(Arc::new(LogMailer::new(config)))
        }
    }
}

/// SendGrid v3 `mail/send` client
#[derive(Clone)]
pub struct SendGridMailer {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_name: String,
    from_email: String,
    sandbox: bool,
}

impl SendGridMailer {
    pub fn new(config: &MailConfig, api_key: &str) -> Result<Self, MailError> {
        let http_client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            api_key: api_key.to_string(),
            from_name: config.from_name.clone(),
            from_email: config.from_email.clone(),
            sandbox: config.sandbox,
        })
    }

    fn payload(&self, email: &InvitationEmail) -> serde_json::Value {
        json!({
            "personalizations": [{
                "to": [{ "email": email.email, "name": email.username }]
            }],
            "from": { "email": self.from_email, "name": self.from_name },
            "subject": email.subject(&self.from_name),
            "content": [{ "type": "text/plain", "value": email.body(&self.from_name) }],
            "mail_settings": { "sandbox_mode": { "enable": self.sandbox } }
        })
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(&self, email: &InvitationEmail) -> Result<u16, MailError> {
        let response = self
            .http_client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(to = %email.email, status = status.as_u16(), "Mail provider rejected invitation");
            return Err(MailError::Rejected(status.as_u16()));
        }

        tracing::info!(to = %email.email, status = status.as_u16(), sandbox = self.sandbox, "Invitation email sent");
        Ok(status.as_u16())
    }
}

/// Logs invitations instead of delivering them
#[derive(Debug, Clone)]
pub struct LogMailer {
    from_email: String,
}

impl LogMailer {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            from_email: config.from_email.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &InvitationEmail) -> Result<u16, MailError> {
        tracing::info!(
            from = %self.from_email,
            to = %email.email,
            username = %email.username,
            "Invitation email not delivered: no mail API key configured"
        );
        Ok(200)
    }
}
