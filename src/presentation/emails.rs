//! HTML bodies for contact-form email.

use askama::Template;
use time::{OffsetDateTime, macros::format_description};

use crate::domain::contact::ContactRequest;

pub const NOTIFICATION_SUBJECT: &str = "New Inquiry from The Whelmed Engineers Landing Page";
pub const AUTO_REPLY_SUBJECT: &str = "Thank you for contacting The Whelmed Engineers!";

const PREVIEW_CHARS: usize = 200;

#[derive(Template)]
#[template(path = "emails/contact_notification.html")]
pub struct ContactNotificationEmail {
    pub email: String,
    pub phone: String,
    pub message: String,
    pub timestamp: String,
}

impl ContactNotificationEmail {
    pub fn new(request: &ContactRequest, received_at: OffsetDateTime) -> Self {
        Self {
            email: request.email.to_string(),
            phone: request
                .phone
                .clone()
                .unwrap_or_else(|| "Not provided".to_string()),
            message: request.message.clone(),
            timestamp: format_timestamp(received_at),
        }
    }
}

#[derive(Template)]
#[template(path = "emails/auto_reply.html")]
pub struct AutoReplyEmail {
    pub site_title: String,
    pub message_preview: String,
}

impl AutoReplyEmail {
    pub fn new(request: &ContactRequest, site_title: &str) -> Self {
        Self {
            site_title: site_title.to_string(),
            message_preview: message_preview(&request.message),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS UTC` for the instant converted to UTC.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// First 200 characters of `message`, with `...` appended when cut short.
pub fn message_preview(message: &str) -> String {
    let mut chars = message.chars();
    let preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{preview}...")
    } else {
        preview
    }
}
