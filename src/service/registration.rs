//! Registration service
//!
//! Creates an inactive account together with its invitation, then mails the
//! activation link. Delivery happens after the commit and never undoes it:
//! a user whose email bounced can still be activated with the token.

use std::fmt;
use std::sync::Arc;

use crate::config::{AppConfig, MailConfig};
use crate::data::{NewUser, PasswordHash, User, UserRepository, invitations};
use crate::error::StoreError;
use crate::mailer::{InvitationEmail, Mailer};
use crate::metrics::INVITATION_EMAILS_TOTAL;

const MAX_USERNAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 255;
const MIN_PASSWORD_CHARS: usize = 3;
const MAX_PASSWORD_CHARS: usize = 72;

/// Registration request
#[derive(Clone, serde::Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegisterUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl RegisterUser {
    fn validate(&self) -> Result<(), StoreError> {
        let username_chars = self.username.chars().count();
        if username_chars == 0 || username_chars > MAX_USERNAME_CHARS {
            return Err(StoreError::Validation(format!(
                "username must be between 1 and {MAX_USERNAME_CHARS} characters"
            )));
        }

        let email_chars = self.email.chars().count();
        if email_chars == 0 || email_chars > MAX_EMAIL_CHARS || !self.email.contains('@') {
            return Err(StoreError::Validation(format!(
                "email must be an address of at most {MAX_EMAIL_CHARS} characters"
            )));
        }

        let password_chars = self.password.chars().count();
        if !(MIN_PASSWORD_CHARS..=MAX_PASSWORD_CHARS).contains(&password_chars) {
            return Err(StoreError::Validation(format!(
                "password must be between {MIN_PASSWORD_CHARS} and {MAX_PASSWORD_CHARS} characters"
            )));
        }

        Ok(())
    }
}

/// Outcome of a registration
pub struct Registration {
    pub user: User,
    /// Raw invitation token, for callers that hand it out themselves
    pub token: String,
    /// false when every delivery attempt failed
    pub invitation_sent: bool,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("user", &self.user)
            .field("token", &"<redacted>")
            .field("invitation_sent", &self.invitation_sent)
            .finish()
    }
}

/// Registration and activation workflow
pub struct RegistrationService {
    users: Arc<dyn UserRepository>,
    mailer: Arc<dyn Mailer>,
    invitation_ttl: chrono::Duration,
    mail: MailConfig,
}

impl RegistrationService {
    pub fn new(users: Arc<dyn UserRepository>, mailer: Arc<dyn Mailer>, config: &AppConfig) -> Self {
        Self {
            users,
            mailer,
            invitation_ttl: config.invitation.ttl(),
            mail: config.mail.clone(),
        }
    }

    /// Register an inactive account and send its invitation
    ///
    /// # Errors
    /// `Validation` for malformed input, `DuplicateEmail` / `DuplicateUsername`
    /// for taken identities. Mail failures are not errors.
    pub async fn register(&self, request: RegisterUser) -> Result<Registration, StoreError> {
        let request = RegisterUser {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password: request.password,
        };
        request.validate()?;

        let password = PasswordHash::hash_blocking(request.password).await?;
        let token = invitations::generate_token();

        let user = self
            .users
            .create_and_invite(
                NewUser {
                    username: request.username,
                    email: request.email,
                    password,
                },
                &token,
                self.invitation_ttl,
            )
            .await?;

        let email = InvitationEmail::new(
            &user.username,
            &user.email,
            &self.mail.activation_base_url,
            &token,
        );
        let invitation_sent = self.deliver(user.id, &email).await;

        Ok(Registration {
            user,
            token,
            invitation_sent,
        })
    }

    /// Redeem an invitation token
    pub async fn activate(&self, raw_token: &str) -> Result<User, StoreError> {
        self.users.activate(raw_token).await
    }

    async fn deliver(&self, user_id: i64, email: &InvitationEmail) -> bool {
        let max_attempts = self.mail.max_retries;

        for attempt in 1..=max_attempts {
            match self.mailer.send(email).await {
                Ok(status) => {
                    INVITATION_EMAILS_TOTAL.with_label_values(&["sent"]).inc();
                    tracing::debug!(user_id, attempt, status, "Invitation delivered");
                    return true;
                }
                Err(error) => {
                    INVITATION_EMAILS_TOTAL.with_label_values(&["failed"]).inc();
                    tracing::warn!(user_id, attempt, max_attempts, error = %error, "Invitation delivery failed");

                    if attempt < max_attempts {
                        tokio::time::sleep(self.mail.retry_backoff() * attempt).await;
                    }
                }
            }
        }

        INVITATION_EMAILS_TOTAL.with_label_values(&["abandoned"]).inc();
        tracing::error!(user_id, max_attempts, "Giving up on invitation email");
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::config::tests::valid_config;
    use crate::data::{Database, UserStore};
    use crate::mailer::{MailError, MockMailer};
    use tempfile::TempDir;

    async fn create_users() -> (Arc<UserStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(&temp_dir.path().join("test.db")).await.unwrap();
        (
            Arc::new(UserStore::new(Arc::new(db), StoreConfig::default())),
            temp_dir,
        )
    }

    fn request(name: &str) -> RegisterUser {
        RegisterUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn register_sends_invitation_and_token_activates() {
        let (users, _temp_dir) = create_users().await;
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| {
                email.email == "alice@example.com"
                    && email.activation_url.starts_with("http://localhost:4000/confirm/")
            })
            .times(1)
            .returning(|_| Ok(202));

        let service = RegistrationService::new(users.clone(), Arc::new(mailer), &valid_config());
        let registration = service.register(request("alice")).await.unwrap();

        assert!(registration.invitation_sent);
        assert!(!registration.user.is_active);
        assert!(registration.user.password.matches("secret"));

        let activated = service.activate(&registration.token).await.unwrap();
        assert!(activated.is_active);
    }

    #[tokio::test]
    async fn mail_failure_is_retried_and_keeps_the_user() {
        let (users, _temp_dir) = create_users().await;
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .times(3)
            .returning(|_| Err(MailError::Rejected(500)));

        let service = RegistrationService::new(users.clone(), Arc::new(mailer), &valid_config());
        let registration = service.register(request("bob")).await.unwrap();

        assert!(!registration.invitation_sent);
        let stored = users.get_by_email("bob@example.com").await.unwrap();
        assert_eq!(stored.id, registration.user.id);
        assert!(service.activate(&registration.token).await.is_ok());
    }

    #[tokio::test]
    async fn mail_retry_stops_after_success() {
        let (users, _temp_dir) = create_users().await;
        let mut mailer = MockMailer::new();
        let mut calls = 0;
        mailer.expect_send().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(MailError::Rejected(503))
            } else {
                Ok(202)
            }
        });

        let service = RegistrationService::new(users, Arc::new(mailer), &valid_config());
        let registration = service.register(request("carol")).await.unwrap();
        assert!(registration.invitation_sent);
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_storage() {
        let (users, _temp_dir) = create_users().await;
        let service = RegistrationService::new(users.clone(), Arc::new(MockMailer::new()), &valid_config());

        let short_password = RegisterUser {
            password: "ab".to_string(),
            ..request("dave")
        };
        let no_at = RegisterUser {
            email: "dave.example.com".to_string(),
            ..request("dave")
        };
        let blank_name = RegisterUser {
            username: "   ".to_string(),
            ..request("dave")
        };

        for bad in [short_password, no_at, blank_name] {
            assert!(matches!(
                service.register(bad).await,
                Err(StoreError::Validation(_))
            ));
        }
        assert!(matches!(
            users.get_by_email("dave@example.com").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn duplicate_registration_sends_no_mail() {
        let (users, _temp_dir) = create_users().await;
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(1).returning(|_| Ok(202));

        let service = RegistrationService::new(users, Arc::new(mailer), &valid_config());
        service.register(request("erin")).await.unwrap();

        let again = RegisterUser {
            username: "erin2".to_string(),
            ..request("erin")
        };
        assert!(matches!(
            service.register(again).await,
            Err(StoreError::DuplicateEmail)
        ));
    }

    #[test]
    fn request_debug_hides_password() {
        let rendered = format!("{:?}", request("frank"));
        assert!(!rendered.contains("secret"));
    }
}
