use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use super::clock::{format_timestamp, local_now};
use super::constants::{DEFAULT_SMTP_PORT, PRODUCT_NAME, SUBJECT_PREFIX};
use super::error::NotifyError;

/// The channel details attached to an alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertContext {
    pub parameter: String,
    pub value: f64,
    pub threshold: f64,
}

/// Something that can deliver alert messages to one recipient.
///
/// Errors are returned, never raised; their display text is the diagnostic shown to the user.
pub trait Dispatcher: Send {
    fn configure(&mut self, server: &str, port: u16, sender: &str, credential: &str);
    fn set_recipient(&mut self, address: &str);
    /// Connectivity self-test
    fn test_connection(&self) -> Result<(), NotifyError>;
    fn send(
        &self,
        subject: &str,
        message: &str,
        context: Option<&AlertContext>,
    ) -> Result<(), NotifyError>;
}

/// Well known mail providers and their submission servers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpProvider {
    Custom,
    Gmail,
    OutlookHotmail,
    Yahoo,
    ExchangeOffice365,
}

impl SmtpProvider {
    pub const ALL: [SmtpProvider; 5] = [
        Self::Custom,
        Self::Gmail,
        Self::OutlookHotmail,
        Self::Yahoo,
        Self::ExchangeOffice365,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Custom => "Custom",
            Self::Gmail => "Gmail",
            Self::OutlookHotmail => "Outlook/Hotmail",
            Self::Yahoo => "Yahoo",
            Self::ExchangeOffice365 => "Exchange/Office365",
        }
    }

    pub fn server(&self) -> &'static str {
        match self {
            Self::Custom => "",
            Self::Gmail => "smtp.gmail.com",
            Self::OutlookHotmail => "smtp-mail.outlook.com",
            Self::Yahoo => "smtp.mail.yahoo.com",
            Self::ExchangeOffice365 => "smtp.office365.com",
        }
    }

    pub fn port(&self) -> u16 {
        DEFAULT_SMTP_PORT
    }

    /// Find the provider matching a server/port pair, or Custom
    pub fn detect(server: &str, port: u16) -> Self {
        Self::ALL
            .into_iter()
            .skip(1)
            .find(|p| p.server() == server && p.port() == port)
            .unwrap_or(Self::Custom)
    }
}

/// SMTP settings as stored in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub server: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub sender: String,
    pub password: String,
    pub recipient: String,
}

fn default_port() -> u16 {
    DEFAULT_SMTP_PORT
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            server: String::from(SmtpProvider::Gmail.server()),
            port: DEFAULT_SMTP_PORT,
            sender: String::from(""),
            password: String::from(""),
            recipient: String::from(""),
        }
    }
}

#[derive(Debug, Clone)]
struct SmtpSettings {
    server: String,
    port: u16,
    sender: String,
    password: String,
}

/// Sends alerts by email over SMTP with STARTTLS
#[derive(Debug, Clone, Default)]
pub struct EmailNotifier {
    settings: Option<SmtpSettings>,
    recipient: Option<String>,
}

impl EmailNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EmailConfig) -> Self {
        let mut notifier = Self::new();
        notifier.configure(
            &config.server,
            config.port,
            &config.sender,
            &config.password,
        );
        notifier.set_recipient(&config.recipient);
        notifier
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    fn settings(&self) -> Result<&SmtpSettings, NotifyError> {
        self.settings.as_ref().ok_or(NotifyError::NotConfigured)
    }

    fn transport(settings: &SmtpSettings) -> Result<SmtpTransport, NotifyError> {
        let creds = Credentials::new(settings.sender.clone(), settings.password.clone());
        Ok(SmtpTransport::starttls_relay(&settings.server)?
            .port(settings.port)
            .credentials(creds)
            .build())
    }
}

impl Dispatcher for EmailNotifier {
    fn configure(&mut self, server: &str, port: u16, sender: &str, credential: &str) {
        self.settings = Some(SmtpSettings {
            server: server.to_string(),
            port,
            sender: sender.to_string(),
            password: credential.to_string(),
        });
    }

    fn set_recipient(&mut self, address: &str) {
        self.recipient = if address.trim().is_empty() {
            None
        } else {
            Some(address.trim().to_string())
        };
    }

    fn test_connection(&self) -> Result<(), NotifyError> {
        let settings = self.settings()?;
        if Self::transport(settings)?.test_connection()? {
            Ok(())
        } else {
            Err(NotifyError::Rejected(settings.server.clone()))
        }
    }

    fn send(
        &self,
        subject: &str,
        message: &str,
        context: Option<&AlertContext>,
    ) -> Result<(), NotifyError> {
        let settings = self.settings()?;
        let recipient = self.recipient.as_deref().ok_or(NotifyError::NoRecipient)?;

        let (subject, body) = compose_message(subject, message, context, local_now());
        let email = Message::builder()
            .from(parse_mailbox(&settings.sender)?)
            .to(parse_mailbox(recipient)?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        Self::transport(settings)?.send(&email)?;
        log::info!("Alert email sent successfully to {recipient}");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e| NotifyError::BadAddress(address.to_string(), e))
}

/// The (subject, body) pair of an alert email sent at `time`
pub fn compose_message(
    subject: &str,
    message: &str,
    context: Option<&AlertContext>,
    time: PrimitiveDateTime,
) -> (String, String) {
    (compose_subject(subject), compose_body(message, context, time))
}

/// The subject line, tagged with the product name
pub fn compose_subject(subject: &str) -> String {
    format!("{SUBJECT_PREFIX}: {subject}")
}

/// The plain text body of an alert
pub fn compose_body(
    message: &str,
    context: Option<&AlertContext>,
    time: PrimitiveDateTime,
) -> String {
    let mut body = format!(
        "\n{PRODUCT_NAME} Alert\n\nTime: {}\n\nAlert Details:\n{message}\n",
        format_timestamp(time)
    );
    if let Some(ctx) = context {
        body.push_str(&format!(
            "\nParameter: {}\nCurrent Value: {}\nThreshold: {}\n",
            ctx.parameter, ctx.value, ctx.threshold
        ));
    }
    body.push_str(&format!("\nThis is an automated message from {PRODUCT_NAME}.\n"));
    body
}

/// Send the canned message used to check that notifications reach the recipient
pub fn send_test_alert(dispatcher: &dyn Dispatcher) -> Result<(), NotifyError> {
    dispatcher.send(
        "Test Alert",
        &format!(
            "This is a test alert from {PRODUCT_NAME} to verify email notifications are working correctly."
        ),
        None,
    )
}
