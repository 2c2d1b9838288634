//! Email delivery over SMTP.
//!
//! [`SmtpMailer`] implements [`EmailSender`]: it loads the stored template
//! by id, renders subject and body against the context and sends the result
//! as an HTML message.

use std::time::Duration;

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::Value;

use kadernim_app::ports::{DeliveryReport, EmailSender, TemplateRepository};
use kadernim_domain::error::KadernimError;
use kadernim_domain::id::TemplateId;
use kadernim_domain::template::TemplateChannel;

use crate::error::EmailError;

/// Default SMTP submission port (STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// SMTP server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// RFC 5322 "From" mailbox, e.g. `Kadernim <noreply@kadernim.com>`.
    pub from: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS. Only local relays should turn
    /// this off.
    pub starttls: bool,
}

pub struct SmtpMailer<T> {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    templates: T,
}

impl<T: TemplateRepository> SmtpMailer<T> {
    /// Build the transport. No connection is opened until the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` is not a valid mailbox or the TLS
    /// parameters for `host` cannot be built.
    pub fn new(config: SmtpConfig, templates: T) -> Result<Self, EmailError> {
        let from: Mailbox = config.from.parse()?;
        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port).timeout(Some(SMTP_TIMEOUT));
        if let (Some(user), Some(password)) = (config.user, config.password) {
            builder = builder.credentials(Credentials::new(user, password));
        }
        Ok(Self {
            transport: builder.build(),
            from,
            templates,
        })
    }
}

impl<T: TemplateRepository> EmailSender for SmtpMailer<T> {
    #[tracing::instrument(skip(self, to, context))]
    async fn send(
        &self,
        template_id: &str,
        to: &str,
        context: &Value,
    ) -> Result<DeliveryReport, KadernimError> {
        let template = match template_id.parse::<TemplateId>() {
            Ok(id) => self
                .templates
                .get_by_id(id)
                .await?
                .filter(|t| t.channel == TemplateChannel::Email),
            Err(_) => None,
        };
        let Some(template) = template else {
            return Ok(DeliveryReport::failed("Template de email não encontrado"));
        };
        if !template.is_active {
            return Ok(DeliveryReport::failed("Template de email inativo"));
        }
        let Ok(recipient) = to.parse::<Mailbox>() else {
            return Ok(DeliveryReport::failed(format!(
                "Endereço de email inválido: {to}"
            )));
        };

        let rendered = template.render(context);
        let message = Message::builder()
            .from(self.from.clone())
            .to(recipient)
            .subject(rendered.subject.unwrap_or(template.name))
            .header(ContentType::TEXT_HTML)
            .body(rendered.body)
            .map_err(EmailError::from)?;

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::info!("email sent");
                Ok(DeliveryReport::delivered())
            }
            Err(err) if err.is_permanent() => {
                tracing::warn!(error = %err, "smtp server rejected email");
                Ok(DeliveryReport::failed(err.to_string()))
            }
            Err(err) => Err(EmailError::Transport(err).into()),
        }
    }
}
