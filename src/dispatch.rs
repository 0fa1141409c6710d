use anyhow::{ensure, Context};
use lettre::{
    message::{Mailboxes, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
        response::Response,
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use log::{debug, error, info};
use serde::Serialize;
use tokio::runtime::{Builder, Runtime};

use crate::{
    config::{Config, EmailConfig},
    message::MessageRecord,
};

/// Fully assembled message ready to be handed to a [`Transport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub text: String,
    pub html: String,
}

impl OutgoingMail {
    pub fn new(from: &str, message: &MessageRecord) -> Self {
        Self {
            from: from.to_string(),
            to: message.to.clone(),
            subject: message.subject.clone(),
            cc: message.cc.clone(),
            bcc: message.bcc.clone(),
            text: message.body().to_string(),
            html: message.html_body(),
        }
    }
}

/// What the relay answered when accepting the message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub code: String,
    pub message: Vec<String>,
}

impl From<&Response> for Receipt {
    fn from(response: &Response) -> Self {
        Self {
            code: response.code().to_string(),
            message: response.message().map(str::to_string).collect(),
        }
    }
}

pub trait Transport {
    /// Makes a single delivery attempt
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<Receipt>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<Receipt> {
        (**self).send(mail)
    }
}

#[derive(Debug)]
pub enum Delivery {
    Disabled,
    Sent(Receipt),
    Failed(anyhow::Error),
}

/// Sends the message using `transport` if email is enabled in `config`
///
/// Failures are logged and returned, they are not escalated.
pub fn dispatch<T: Transport + ?Sized>(
    config: &Config,
    transport: Option<&T>,
    message: &MessageRecord,
) -> Delivery {
    let (email, transport) = match (config.email.as_ref(), transport) {
        (Some(email), Some(transport)) if email.enabled => (email, transport),
        _ => {
            error!("Email alert is disabled.");
            return Delivery::Disabled;
        }
    };

    let mail = OutgoingMail::new(&email.from, message);
    debug!("Sending {} bytes of text to {}", mail.text.len(), mail.to);
    match transport.send(&mail) {
        Ok(receipt) => {
            match serde_json::to_string(&receipt) {
                Ok(json) => info!("Email info: {json}"),
                Err(e) => info!("Email info: {receipt:?} (not serializable: {e})"),
            }
            Delivery::Sent(receipt)
        }
        Err(e) => {
            error!("Unable to send email");
            error!("{e:?}");
            Delivery::Failed(e)
        }
    }
}

/// Sends email through the SMTP relay from the config
pub struct SmtpRelay {
    rt: Runtime,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpRelay {
    pub fn new(email: &EmailConfig, ignore_ssl: bool) -> anyhow::Result<Self> {
        ensure!(!email.host.is_empty(), "No SMTP host configured (email.host)");
        debug!(
            "Creating SMTP relay for {}:{} (secure: {}, ignore ssl: {ignore_ssl})",
            email.host, email.port, email.secure
        );
        let tls_parameters = TlsParameters::builder(email.host.clone())
            .dangerous_accept_invalid_certs(ignore_ssl)
            .dangerous_accept_invalid_hostnames(ignore_ssl)
            .build()
            .context("Failed to build TLS parameters")?;
        let tls = if email.secure {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(email.host.as_str())
                .port(email.port)
                .tls(tls);
        if let Some(auth) = &email.auth {
            builder = builder.credentials(Credentials::new(auth.user.clone(), auth.pass.clone()));
        }

        let rt = Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create async runtime")?;
        Ok(Self {
            rt,
            mailer: builder.build(),
        })
    }

    async fn do_send(&self, message: Message) -> anyhow::Result<Response> {
        self.mailer
            .send(message)
            .await
            .context("Failed to send message via SMTP relay")
    }
}

impl Transport for SmtpRelay {
    fn send(&self, mail: &OutgoingMail) -> anyhow::Result<Receipt> {
        let message = build_message(mail)?;
        let response = self.rt.block_on(self.do_send(message))?;
        Ok(Receipt::from(&response))
    }
}

/// Builds a plain text and html alternative message
pub fn build_message(mail: &OutgoingMail) -> anyhow::Result<Message> {
    ensure!(!mail.from.is_empty(), "No from address configured (email.from)");
    let mut builder = Message::builder().from(
        mail.from
            .parse()
            .with_context(|| format!("Failed to parse from address: {:?}", mail.from))?,
    );
    for to in parse_list(&mail.to, "to")? {
        builder = builder.to(to);
    }
    if let Some(cc) = &mail.cc {
        for cc in parse_list(cc, "cc")? {
            builder = builder.cc(cc);
        }
    }
    if let Some(bcc) = &mail.bcc {
        for bcc in parse_list(bcc, "bcc")? {
            builder = builder.bcc(bcc);
        }
    }
    if let Some(subject) = &mail.subject {
        builder = builder.subject(subject);
    }
    builder
        .multipart(MultiPart::alternative_plain_html(
            mail.text.clone(),
            mail.html.clone(),
        ))
        .context("Failed to build message")
}

fn parse_list(list: &str, field: &str) -> anyhow::Result<Mailboxes> {
    list.parse()
        .with_context(|| format!("Failed to parse {field} addresses: {list:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use anyhow::bail;

    #[derive(Default)]
    struct FakeTransport {
        sent: RefCell<Vec<OutgoingMail>>,
        fail: bool,
    }

    impl Transport for FakeTransport {
        fn send(&self, mail: &OutgoingMail) -> anyhow::Result<Receipt> {
            self.sent.borrow_mut().push(mail.clone());
            if self.fail {
                bail!("relay refused connection");
            }
            Ok(Receipt {
                code: "250".to_string(),
                message: vec!["OK queued".to_string()],
            })
        }
    }

    fn config(enabled: bool) -> Config {
        Config {
            email: Some(EmailConfig {
                enabled,
                host: "smtp.example.com".to_string(),
                port: 587,
                secure: false,
                from: "alerts@example.com".to_string(),
                auth: None,
            }),
            ..Default::default()
        }
    }

    fn message() -> MessageRecord {
        let mut message = MessageRecord::new("ops@example.com".to_string());
        message.subject = Some("Backup".to_string());
        message.cc = Some("a@example.com, b@example.com".to_string());
        message.append_body("line 1\nline 2\n");
        message
    }

    #[test]
    fn sends_configured_from_and_record_fields() {
        // Arrange
        let transport = FakeTransport::default();

        // Act
        let delivery = dispatch(&config(true), Some(&transport), &message());

        // Assert
        assert!(matches!(delivery, Delivery::Sent(receipt) if receipt.code == "250"));
        let sent = transport.sent.borrow();
        assert_eq!(
            *sent,
            vec![OutgoingMail {
                from: "alerts@example.com".to_string(),
                to: "ops@example.com".to_string(),
                subject: Some("Backup".to_string()),
                cc: Some("a@example.com, b@example.com".to_string()),
                bcc: None,
                text: "line 1\nline 2\n".to_string(),
                html: "line 1<br>line 2<br>".to_string(),
            }]
        );
    }

    #[test]
    fn disabled_never_calls_transport() {
        let transport = FakeTransport::default();
        let delivery = dispatch(&config(false), Some(&transport), &message());
        assert!(matches!(delivery, Delivery::Disabled));
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn missing_email_section_is_disabled() {
        let delivery = dispatch::<FakeTransport>(&Config::default(), None, &message());
        assert!(matches!(delivery, Delivery::Disabled));
    }

    #[test]
    fn failure_is_reported_not_retried() {
        // Arrange
        let transport = FakeTransport {
            fail: true,
            ..Default::default()
        };

        // Act
        let delivery = dispatch(&config(true), Some(&transport), &message());

        // Assert
        assert!(matches!(delivery, Delivery::Failed(_)));
        assert_eq!(transport.sent.borrow().len(), 1);
    }

    #[test]
    fn message_has_all_recipients() {
        // Arrange
        let mut mail = OutgoingMail::new("Alerts <alerts@example.com>", &message());
        mail.bcc = Some("hidden@example.com".to_string());

        // Act
        let formatted = String::from_utf8(build_message(&mail).unwrap().formatted()).unwrap();

        // Assert
        assert!(formatted.contains("From: Alerts <alerts@example.com>"));
        assert!(formatted.contains("To: ops@example.com"));
        assert!(formatted.contains("Cc: a@example.com, b@example.com"));
        assert!(formatted.contains("Subject: Backup"));
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("line 1<br>line 2<br>"));
    }

    #[test]
    fn no_subject_header_without_subject() {
        let mut mail = OutgoingMail::new("alerts@example.com", &message());
        mail.subject = None;
        let formatted = String::from_utf8(build_message(&mail).unwrap().formatted()).unwrap();
        assert!(!formatted.contains("Subject:"));
    }

    #[test]
    fn bad_address_is_error() {
        let mut mail = OutgoingMail::new("alerts@example.com", &message());
        mail.cc = Some("not an address".to_string());
        assert!(build_message(&mail).is_err());
    }

    #[test]
    fn empty_from_is_error() {
        let mail = OutgoingMail::new("", &message());
        let err = build_message(&mail).unwrap_err();
        assert!(err.to_string().contains("email.from"), "{err}");
    }

    #[test]
    fn relay_needs_host() {
        // Arrange
        let mut email = config(true).email.unwrap();
        email.host = String::new();

        // Act
        let result = SmtpRelay::new(&email, false);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn relay_builds_without_connecting() {
        let email = config(true).email.unwrap();
        assert!(SmtpRelay::new(&email, true).is_ok());
    }
}
