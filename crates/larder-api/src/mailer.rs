//! Outgoing email. Delivery is behind the `Mailer` trait: `SmtpMailer` sends
//! through a relay, `LogMailer` only writes the message to the log.

use std::sync::Mutex;

use anyhow::Context;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::{debug, info};

use larder_types::models::FoodItem;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: &Email) -> anyhow::Result<()>;
}

/// Port for implicit TLS. Any other port upgrades with STARTTLS.
pub const SMTPS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address, e.g. `Larder <no-reply@larder.example>`.
    pub from: String,
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> anyhow::Result<Self> {
        let from: Mailbox = settings
            .from
            .parse()
            .with_context(|| format!("invalid sender address: {}", settings.from))?;

        let mut builder = if settings.port == SMTPS_PORT {
            SmtpTransport::relay(&settings.host)
        } else {
            SmtpTransport::starttls_relay(&settings.host)
        }
        .with_context(|| format!("invalid SMTP host: {}", settings.host))?
        .port(settings.port);

        if let Some(username) = &settings.username {
            let password = settings.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: &Email) -> anyhow::Result<()> {
        let message = build_message(&self.from, email)?;
        self.transport
            .send(&message)
            .with_context(|| format!("SMTP delivery to {} failed", email.to))?;
        info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

pub fn build_message(from: &Mailbox, email: &Email) -> anyhow::Result<Message> {
    let to: Mailbox = email
        .to
        .parse()
        .with_context(|| format!("invalid recipient address: {}", email.to))?;
    Ok(Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(email.body.clone())?)
}

/// Logs every email instead of delivering it.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: &Email) -> anyhow::Result<()> {
        info!(to = %email.to, subject = %email.subject, "Email (log only)");
        debug!("{}", email.body);
        Ok(())
    }
}

/// Keeps sent emails in memory. Used by tests to read one-time codes.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<Email>>,
}

impl MemoryMailer {
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send(&self, email: &Email) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|e| anyhow::anyhow!("outbox lock poisoned: {}", e))?
            .push(email.clone());
        Ok(())
    }
}

pub fn otp_email(to: &str, otp: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Your password reset code".into(),
        body: format!("Your password reset code is {otp}. It expires in 10 minutes."),
    }
}

/// `days_left <= 0` means the item has already expired.
pub fn expiry_email(to: &str, item: &FoodItem, days_left: i64, suggestions: &[String]) -> Email {
    let headline = if days_left <= 0 {
        format!("{} has expired!", item.name)
    } else {
        format!("{} expires in {}", item.name, plural_days(days_left))
    };

    let mut body = format!(
        "{headline}\n\nCategory: {}\nExpiry date: {}\n",
        item.category,
        item.expiry_date.format("%Y-%m-%d")
    );
    if !suggestions.is_empty() {
        body.push_str("\nIdeas to use it:\n");
        for s in suggestions {
            body.push_str("- ");
            body.push_str(s);
            body.push('\n');
        }
    }

    Email {
        to: to.to_string(),
        subject: headline,
        body,
    }
}

pub fn plural_days(n: i64) -> String {
    if n == 1 {
        "1 day".into()
    } else {
        format!("{n} days")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use uuid::Uuid;

    use super::*;

    fn item() -> FoodItem {
        let at = chrono::Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        FoodItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Milk".into(),
            category: "Dairy Products".into(),
            shelf_life: 5,
            m_date: at,
            expiry_date: at,
            is_wasted: false,
            wasted_at: None,
            created_at: at,
        }
    }

    #[test]
    fn expiry_subject_depends_on_days_left() {
        assert_eq!(expiry_email("a@x.io", &item(), 0, &[]).subject, "Milk has expired!");
        assert_eq!(expiry_email("a@x.io", &item(), 1, &[]).subject, "Milk expires in 1 day");
        assert_eq!(expiry_email("a@x.io", &item(), 3, &[]).subject, "Milk expires in 3 days");
    }

    #[test]
    fn smtp_message_carries_sender_recipient_and_body() {
        let from: Mailbox = "Larder <no-reply@larder.io>".parse().unwrap();
        let msg = build_message(&from, &otp_email("ada@larder.io", "424242")).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("From: Larder <no-reply@larder.io>"));
        assert!(raw.contains("To: ada@larder.io"));
        assert!(raw.contains("Subject: Your password reset code"));
        assert!(raw.contains("424242"));

        let bad = Email {
            to: "not an address".into(),
            ..otp_email("x@larder.io", "1")
        };
        assert!(build_message(&from, &bad).is_err());
    }

    #[test]
    fn smtp_mailer_rejects_a_bad_sender() {
        let settings = SmtpSettings {
            host: "smtp.larder.io".into(),
            port: 587,
            username: Some("larder".into()),
            password: Some("hunter2".into()),
            from: "larder".into(),
        };
        assert!(SmtpMailer::new(&settings).is_err());
        assert!(
            SmtpMailer::new(&SmtpSettings {
                from: "no-reply@larder.io".into(),
                ..settings
            })
            .is_ok()
        );
    }

    #[test]
    fn memory_mailer_keeps_messages() {
        let mailer = MemoryMailer::default();
        mailer.send(&otp_email("a@x.io", "123456")).unwrap();
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("123456"));
    }
}
