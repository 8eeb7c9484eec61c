//! Contact form submissions and their validation.

use lettre::Address;
use serde::Deserialize;

use super::error::DomainError;

/// Raw submission as posted by the landing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactRequest {
    pub email: Address,
    pub phone: Option<String>,
    pub message: String,
}

impl ContactForm {
    pub fn validate(self) -> Result<ContactRequest, DomainError> {
        let email_raw = self.email.trim();
        if email_raw.is_empty() {
            return Err(DomainError::validation("email", "an email address is required"));
        }
        let email = email_raw
            .parse::<Address>()
            .map_err(|err| DomainError::validation("email", err.to_string()))?;

        let message = self.message.trim();
        if message.is_empty() {
            return Err(DomainError::validation("message", "a message is required"));
        }

        let phone = self
            .phone
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty());

        Ok(ContactRequest {
            email,
            phone,
            message: message.to_string(),
        })
    }
}
