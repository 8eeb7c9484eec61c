//! Outbound email over SMTP.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    address::AddressError,
    message::{Mailbox, header::ContentType},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::MailSettings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("outbound mail is not configured")]
    Disabled,
    #[error("mail configuration error: {0}")]
    Configuration(String),
    #[error("invalid address: {0}")]
    Address(#[from] AddressError),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// A rendered HTML message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: Address,
    pub reply_to: Option<Address>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Mailer used when no SMTP server is configured; every send fails with [`MailError::Disabled`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        debug!(to = %email.to, subject = %email.subject, "Dropping email; mail is disabled");
        Err(MailError::Disabled)
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &MailSettings, server: &str) -> Result<Self, MailError> {
        let from_address = settings
            .from
            .as_deref()
            .or(settings.username.as_deref())
            .ok_or_else(|| {
                MailError::Configuration("mail.from or mail.username must be set".to_string())
            })?
            .parse::<Address>()?;
        let from = Mailbox::new(Some(settings.from_name.clone()), from_address);

        let mut builder = if settings.ssl_tls || settings.starttls {
            let tls = TlsParameters::builder(server.to_string())
                .dangerous_accept_invalid_certs(!settings.validate_certs)
                .build()?;
            let tls = if settings.ssl_tls {
                Tls::Wrapper(tls)
            } else {
                Tls::Required(tls)
            };
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server).tls(tls)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(server)
        };
        builder = builder.port(settings.port);

        if let (Some(username), Some(password)) =
            (settings.username.as_ref(), settings.password.as_ref())
        {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        info!(
            server,
            port = settings.port,
            starttls = settings.starttls,
            ssl_tls = settings.ssl_tls,
            "SMTP mailer configured"
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let mut message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, email.to))
            .subject(email.subject)
            .header(ContentType::TEXT_HTML);
        if let Some(reply_to) = email.reply_to {
            message = message.reply_to(Mailbox::new(None, reply_to));
        }
        let message = message.body(email.html)?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Build the mailer described by `settings`, falling back to [`DisabledMailer`] without a server.
pub fn build_mailer(settings: &MailSettings) -> Result<Arc<dyn Mailer>, MailError> {
    match settings.server.as_deref() {
        Some(server) => Ok(Arc::new(SmtpMailer::new(settings, server)?)),
        None => {
            info!("No SMTP server configured; contact emails are disabled");
            Ok(Arc::new(DisabledMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MailSettings {
        MailSettings {
            server: None,
            port: 587,
            username: None,
            password: None,
            from: None,
            from_name: "The Whelmed Engineers".to_string(),
            starttls: true,
            ssl_tls: false,
            validate_certs: true,
            contact_recipient: "owner@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_server_disables_mail() {
        let mailer = build_mailer(&settings()).expect("mailer");
        let err = mailer
            .send(OutgoingEmail {
                to: "reader@example.com".parse().expect("address"),
                reply_to: None,
                subject: "hi".into(),
                html: "<p>hi</p>".into(),
            })
            .await
            .expect_err("disabled mailer refuses");
        assert!(matches!(err, MailError::Disabled));
    }

    #[test]
    fn smtp_requires_a_sender() {
        let err = SmtpMailer::new(&settings(), "smtp.example.com")
            .err()
            .expect("sender required");
        assert!(matches!(err, MailError::Configuration(_)));
    }

    #[tokio::test]
    async fn smtp_mailer_builds_with_credentials() {
        let mut settings = settings();
        settings.server = Some("smtp.example.com".into());
        settings.username = Some("owner@example.com".into());
        settings.password = Some("secret".into());
        assert!(SmtpMailer::new(&settings, "smtp.example.com").is_ok());
    }
}
