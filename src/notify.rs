//! Mail to the couple whenever a guest responds.

use std::fmt::Write as _;

use lettre::message::{header, header::ContentType, Mailbox, Mailboxes};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::MailConfig;
use crate::models::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseNotice {
    pub guest_name: String,
    pub status: AttendanceStatus,
    pub plus_one_allowed: bool,
    pub plus_one_name: Option<String>,
    pub dietary_notes: Option<String>,
    pub message: Option<String>,
}

impl ResponseNotice {
    pub fn subject(&self) -> String {
        let verb = match self.status {
            AttendanceStatus::Attending => "accepted",
            AttendanceStatus::NotAttending => "declined",
            AttendanceStatus::Pending | AttendanceStatus::Maybe => "answered",
        };
        format!("{} has {verb} your invitation.", self.guest_name)
    }

    pub fn body(&self) -> String {
        let mut body = self.subject();
        body.push('\n');
        let _ = writeln!(
            body,
            "Dietary restrictions: {}",
            self.dietary_notes.as_deref().unwrap_or("N/A")
        );
        if self.plus_one_allowed {
            let _ = writeln!(
                body,
                "Plus one name: {}",
                self.plus_one_name.as_deref().unwrap_or("NO GUEST")
            );
        }
        if let Some(message) = &self.message {
            let _ = writeln!(body, "Message: {message}");
        }
        body
    }
}

/// Fire-and-forget delivery; failures never reach the guest.
pub trait Notifier: Send + Sync {
    fn response_received(&self, notice: ResponseNotice);
}

/// Used when no mail relay is configured.
pub struct Disabled;

impl Notifier for Disabled {
    fn response_received(&self, _notice: ResponseNotice) {}
}

pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    to: Mailboxes,
}

#[derive(Debug, thiserror::Error)]
pub enum MailSetupError {
    #[error("smtp relay: {0}")]
    Relay(#[from] lettre::transport::smtp::Error),

    #[error("mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, MailSetupError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = SmtpTransport::starttls_relay(&config.relay)?
            .credentials(creds)
            .build();
        let to: Mailboxes = config.to.parse()?;
        let from: Mailbox = config.from.parse()?;

        Ok(Self { transport, from, to })
    }

    fn build(&self, notice: &ResponseNotice) -> Result<Message, lettre::error::Error> {
        let to_header: header::To = self.to.clone().into();

        Message::builder()
            .mailbox(to_header)
            .from(self.from.clone())
            .subject(notice.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(notice.body())
    }
}

impl Notifier for SmtpNotifier {
    fn response_received(&self, notice: ResponseNotice) {
        let email = match self.build(&notice) {
            Ok(email) => email,
            Err(e) => {
                warn!(error = %e, "could not compose response mail");
                return;
            }
        };

        let transport = self.transport.clone();
        rocket::tokio::task::spawn_blocking(move || match transport.send(&email) {
            Ok(_) => info!("response mail sent"),
            Err(e) => warn!(error = %e, "could not send response mail"),
        });
    }
}

/// Keeps every notice in memory.
#[derive(Default)]
pub struct Recording {
    notices: Mutex<Vec<ResponseNotice>>,
}

impl Recording {
    pub fn notices(&self) -> Vec<ResponseNotice> {
        self.notices.lock().clone()
    }
}

impl Notifier for Recording {
    fn response_received(&self, notice: ResponseNotice) {
        self.notices.lock().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn notice(status: AttendanceStatus) -> ResponseNotice {
        ResponseNotice {
            guest_name: "Anna Botha".into(),
            status,
            plus_one_allowed: true,
            plus_one_name: None,
            dietary_notes: Some("No nuts".into()),
            message: Some("Dancing Queen".into()),
        }
    }

    #[test]
    fn body_lists_the_answers() {
        assert_eq!(
            notice(AttendanceStatus::Attending).body(),
            "Anna Botha has accepted your invitation.\n\
             Dietary restrictions: No nuts\n\
             Plus one name: NO GUEST\n\
             Message: Dancing Queen\n"
        );
    }

    #[test]
    fn plus_one_line_only_for_entitled_guests() {
        let mut n = notice(AttendanceStatus::NotAttending);
        n.plus_one_allowed = false;
        n.dietary_notes = None;
        n.message = None;
        assert_eq!(
            n.body(),
            "Anna Botha has declined your invitation.\nDietary restrictions: N/A\n"
        );
    }

    #[test]
    fn bad_addresses_are_caught_at_startup() {
        let config = MailConfig {
            relay: "smtp.example.com".into(),
            username: "u".into(),
            password: "p".into(),
            from: "not an address".into(),
            to: "Couple <couple@example.com>".into(),
        };
        assert!(matches!(
            SmtpNotifier::new(&config),
            Err(MailSetupError::Address(_))
        ));
    }

    #[test]
    fn mail_goes_from_the_configured_sender_to_the_couple() {
        let config = MailConfig {
            relay: "smtp.example.com".into(),
            username: "u".into(),
            password: "p".into(),
            from: "RSVP <rsvp@example.com>".into(),
            to: "Anna <anna@example.com>, Ben <ben@example.com>".into(),
        };
        let notifier = SmtpNotifier::new(&config).unwrap();
        let email = notifier.build(&notice(AttendanceStatus::Attending)).unwrap();

        let envelope = email.envelope();
        assert_eq!(
            envelope.from().map(ToString::to_string).as_deref(),
            Some("rsvp@example.com")
        );
        assert_eq!(envelope.to().len(), 2);
        let headers = String::from_utf8(email.formatted()).unwrap();
        assert!(headers.contains("Subject: Anna Botha has accepted your invitation."));
    }
}
