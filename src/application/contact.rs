use std::sync::Arc;

use askama::Template;
use lettre::Address;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::domain::contact::{ContactForm, ContactRequest};
use crate::domain::error::DomainError;
use crate::infra::mail::{MailError, Mailer, OutgoingEmail};
use crate::presentation::emails::{
    AUTO_REPLY_SUBJECT, AutoReplyEmail, ContactNotificationEmail, NOTIFICATION_SUBJECT,
};

const SOURCE: &str = "application::contact::ContactService";

#[derive(Debug, Error)]
pub enum ContactError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("failed to render email: {0}")]
    Render(#[from] askama::Error),
    #[error("failed to notify site owner: {0}")]
    Notification(#[source] MailError),
}

/// Result of an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactReceipt {
    pub auto_reply_sent: bool,
}

#[derive(Clone)]
pub struct ContactService {
    mailer: Arc<dyn Mailer>,
    recipient: Address,
    site_title: String,
}

impl ContactService {
    pub fn new(mailer: Arc<dyn Mailer>, recipient: Address, site_title: impl Into<String>) -> Self {
        Self {
            mailer,
            recipient,
            site_title: site_title.into(),
        }
    }

    /// Validate the form, notify the site owner and send a best-effort auto-reply.
    pub async fn submit(&self, form: ContactForm) -> Result<ContactReceipt, ContactError> {
        let request = form.validate()?;
        self.submit_at(&request, OffsetDateTime::now_utc()).await
    }

    async fn submit_at(
        &self,
        request: &ContactRequest,
        received_at: OffsetDateTime,
    ) -> Result<ContactReceipt, ContactError> {
        let notification = OutgoingEmail {
            to: self.recipient.clone(),
            reply_to: Some(request.email.clone()),
            subject: NOTIFICATION_SUBJECT.to_string(),
            html: ContactNotificationEmail::new(request, received_at).render()?,
        };
        self.mailer
            .send(notification)
            .await
            .map_err(ContactError::Notification)?;

        let auto_reply_sent = self.send_auto_reply(request).await;
        info!(
            target = SOURCE,
            from = %request.email,
            auto_reply_sent,
            "Contact submission delivered"
        );

        Ok(ContactReceipt { auto_reply_sent })
    }

    async fn send_auto_reply(&self, request: &ContactRequest) -> bool {
        let html = match AutoReplyEmail::new(request, &self.site_title).render() {
            Ok(html) => html,
            Err(err) => {
                warn!(target = SOURCE, error = %err, "Failed to render auto-reply");
                return false;
            }
        };

        let reply = OutgoingEmail {
            to: request.email.clone(),
            reply_to: None,
            subject: AUTO_REPLY_SUBJECT.to_string(),
            html,
        };

        match self.mailer.send(reply).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    target = SOURCE,
                    to = %request.email,
                    error = %err,
                    "Auto-reply could not be sent"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// Records sends and fails the ones addressed to `fail_for`.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
            if self.fail_for.as_deref() == Some(email.to.to_string().as_str()) {
                return Err(MailError::Disabled);
            }
            self.sent.lock().expect("sent lock").push(email);
            Ok(())
        }
    }

    fn service(mailer: Arc<RecordingMailer>) -> ContactService {
        ContactService::new(
            mailer,
            "owner@example.com".parse().expect("address"),
            "atharva",
        )
    }

    fn form() -> ContactForm {
        ContactForm {
            email: "reader@example.com".into(),
            phone: Some("555-0100".into()),
            message: "Let's build something".into(),
        }
    }

    #[tokio::test]
    async fn notification_and_auto_reply_are_sent() {
        let mailer = Arc::new(RecordingMailer::default());
        let receipt = service(mailer.clone())
            .submit(form())
            .await
            .expect("accepted");

        assert!(receipt.auto_reply_sent);
        let sent = mailer.sent.lock().expect("sent lock");
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to.to_string(), "owner@example.com");
        assert_eq!(sent[0].subject, NOTIFICATION_SUBJECT);
        assert_eq!(
            sent[0].reply_to.as_ref().map(ToString::to_string),
            Some("reader@example.com".to_string())
        );
        assert_eq!(sent[1].to.to_string(), "reader@example.com");
        assert_eq!(sent[1].subject, AUTO_REPLY_SUBJECT);
        assert!(sent[1].html.contains("build something"));
    }

    #[tokio::test]
    async fn invalid_forms_send_nothing() {
        let mailer = Arc::new(RecordingMailer::default());
        let err = service(mailer.clone())
            .submit(ContactForm {
                email: "nope".into(),
                ..form()
            })
            .await
            .expect_err("rejected");

        assert!(matches!(err, ContactError::Invalid(_)));
        assert!(mailer.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn notification_failure_is_reported() {
        let mailer = Arc::new(RecordingMailer {
            fail_for: Some("owner@example.com".into()),
            ..Default::default()
        });
        let err = service(mailer.clone())
            .submit(form())
            .await
            .expect_err("notification failed");

        assert!(matches!(err, ContactError::Notification(_)));
        assert!(mailer.sent.lock().expect("sent lock").is_empty());
    }

    #[tokio::test]
    async fn auto_reply_failure_does_not_fail_submission() {
        let mailer = Arc::new(RecordingMailer {
            fail_for: Some("reader@example.com".into()),
            ..Default::default()
        });
        let receipt = service(mailer.clone())
            .submit(form())
            .await
            .expect("accepted");

        assert!(!receipt.auto_reply_sent);
        assert_eq!(mailer.sent.lock().expect("sent lock").len(), 1);
    }
}
