use futures::future::BoxFuture;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Mail sender is not configured")]
    NoSender,
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EmailBody {
    Text(String),
    Html(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: EmailBody,
}

pub trait Mailer: Send + Sync {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), MailError>>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Option<String>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        };

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        } else {
            log::warn!("MAIL_USERNAME/MAIL_PASSWORD not set; SMTP will be used unauthenticated");
        }

        Ok(Self {
            transport: builder.build(),
            sender: config.default_sender.clone(),
        })
    }

    async fn deliver(&self, email: OutgoingEmail) -> Result<(), MailError> {
        let sender: Mailbox = self.sender.as_deref().ok_or(MailError::NoSender)?.parse()?;
        let recipient: Mailbox = email.to.parse()?;

        let builder = Message::builder()
            .from(sender)
            .to(recipient)
            .subject(email.subject.clone());
        let message = match email.body {
            EmailBody::Text(text) => builder.header(ContentType::TEXT_PLAIN).body(text)?,
            EmailBody::Html(html) => builder.header(ContentType::TEXT_HTML).body(html)?,
        };

        self.transport.send(message).await?;
        log::info!("Email '{}' sent to {}", email.subject, email.to);
        Ok(())
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'_, Result<(), MailError>> {
        Box::pin(self.deliver(email))
    }
}

pub fn verification_email(to: &str, link: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: "Verify Your Email".to_string(),
        body: EmailBody::Text(format!("Click the link to verify your email: {}", link)),
    }
}

pub fn password_reset_email(to: &str, link: &str) -> OutgoingEmail {
    let html = format!(
        r#"<html>
<head>
    <style>
        .button {{
            background-color: #28a745;
            color: white;
            padding: 12px 20px;
            text-decoration: none;
            font-size: 16px;
            border-radius: 5px;
            display: inline-block;
        }}
    </style>
</head>
<body>
    <h2>Password Reset Request</h2>
    <p>Click the button below to reset your password. This link will expire in 1 hour.</p>
    <a href="{}" class="button">Reset Password</a>
    <p>If you did not request this, please ignore this email.</p>
</body>
</html>"#,
        link
    );
    OutgoingEmail {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        body: EmailBody::Html(html),
    }
}
