//! Action executor: one delivery attempt for one action.
//!
//! [`Executor::execute`] never fails and never unwinds. Missing
//! configuration, unresolvable recipients, provider errors, timeouts and
//! even panics inside a collaborator all come back as an [`ActionOutcome`]
//! with `success = false`, so a broken action cannot abort its siblings.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use chrono::SecondsFormat;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use kadernim_domain::automation::{
    ActionConfig, ActionKind, ConfigError, EmailActionConfig, PushActionConfig,
    WebhookActionConfig, WhatsAppActionConfig,
};
use kadernim_domain::context::AppInfo;
use kadernim_domain::error::{KadernimError, describe};
use kadernim_domain::id::TemplateId;
use kadernim_domain::push::PushPayload;
use kadernim_domain::recipient::{PhoneSource, resolve_email, resolve_phone};
use kadernim_domain::render::render;
use kadernim_domain::template::{NotificationTemplate, TemplateChannel};
use kadernim_domain::time::now;

use crate::context::DefaultContextMapper;
use crate::ports::{
    ChatSender, ContextMapper, DeliveryReport, EmailSender, PushSender, TemplateRepository,
    UserDirectory, WebhookClient, WebhookError,
};

/// Hard deadline for a webhook call.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Characters of a failed webhook response body kept in the error.
const ERROR_BODY_PREVIEW: usize = 100;

pub const DEFAULT_PUSH_TITLE: &str = "Kadernim";
pub const DEFAULT_PUSH_BODY: &str = "Nova notificação";
pub const DEFAULT_PUSH_URL: &str = "/";

/// Result of one action attempt.
///
/// `error` may accompany a success: a push broadcast that reached some but
/// not all devices succeeds and still reports the failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl ActionOutcome {
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

impl From<DeliveryReport> for ActionOutcome {
    fn from(report: DeliveryReport) -> Self {
        Self {
            success: report.success,
            error: report.error,
        }
    }
}

/// Coarse classification of [`ActionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    Inactive,
    Delivery,
    UnknownAction,
}

/// Why an action attempt failed. The `Display` text is what lands in the
/// execution log.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Template de email não configurado")]
    EmailTemplateMissing,

    #[error("Template de WhatsApp não configurado")]
    WhatsAppTemplateMissing,

    #[error("URL do webhook não configurada")]
    WebhookUrlMissing,

    #[error(transparent)]
    InvalidConfig(ConfigError),

    #[error("Email do destinatário não encontrado")]
    RecipientEmailMissing,

    #[error("Telefone do destinatário não encontrado")]
    RecipientPhoneMissing,

    #[error("Template de {0} não encontrado")]
    TemplateNotFound(&'static str),

    #[error("Template de {0} inativo")]
    TemplateInactive(&'static str),

    #[error("Falha ao consultar {what}: {reason}")]
    Lookup { what: &'static str, reason: String },

    #[error("{0}")]
    Provider(String),

    #[error("Webhook excedeu o tempo limite de {0}s")]
    Timeout(u64),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Falha inesperada: {0}")]
    Panicked(String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),
}

impl ActionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmailTemplateMissing
            | Self::WhatsAppTemplateMissing
            | Self::WebhookUrlMissing
            | Self::InvalidConfig(_)
            | Self::RecipientEmailMissing
            | Self::RecipientPhoneMissing => ErrorKind::Configuration,
            Self::TemplateNotFound(_) => ErrorKind::NotFound,
            Self::TemplateInactive(_) => ErrorKind::Inactive,
            Self::Lookup { .. }
            | Self::Provider(_)
            | Self::Timeout(_)
            | Self::HttpStatus { .. }
            | Self::Panicked(_) => ErrorKind::Delivery,
            Self::UnknownAction(_) => ErrorKind::UnknownAction,
        }
    }
}

impl From<ConfigError> for ActionError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownKind(kind) => Self::UnknownAction(kind),
            other => Self::InvalidConfig(other),
        }
    }
}

/// Executes a single action against an event payload.
pub trait Executor: Send + Sync {
    fn execute(
        &self,
        kind: &ActionKind,
        config: &Value,
        payload: &Value,
        event_name: &str,
    ) -> impl Future<Output = ActionOutcome> + Send;
}

/// The four outbound channels an executor delivers through.
#[derive(Debug, Clone)]
pub struct Channels<E, C, P, W> {
    pub email: E,
    pub chat: C,
    pub push: P,
    pub webhook: W,
}

/// Default [`Executor`], dispatching on [`ActionKind`].
pub struct ActionExecutor<T, U, E, C, P, W, M = DefaultContextMapper> {
    templates: T,
    users: U,
    channels: Channels<E, C, P, W>,
    mapper: M,
    webhook_timeout: Duration,
}

impl<T, U, E, C, P, W> ActionExecutor<T, U, E, C, P, W, DefaultContextMapper> {
    /// Create an executor using the [`DefaultContextMapper`] for `app`.
    pub fn new(templates: T, users: U, channels: Channels<E, C, P, W>, app: AppInfo) -> Self {
        Self {
            templates,
            users,
            channels,
            mapper: DefaultContextMapper::new(app),
            webhook_timeout: WEBHOOK_TIMEOUT,
        }
    }
}

impl<T, U, E, C, P, W, M> ActionExecutor<T, U, E, C, P, W, M> {
    /// Swap the context mapper.
    pub fn with_context_mapper<N>(self, mapper: N) -> ActionExecutor<T, U, E, C, P, W, N> {
        ActionExecutor {
            templates: self.templates,
            users: self.users,
            channels: self.channels,
            mapper,
            webhook_timeout: self.webhook_timeout,
        }
    }

    #[must_use]
    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }
}

impl<T, U, E, C, P, W, M> ActionExecutor<T, U, E, C, P, W, M>
where
    T: TemplateRepository,
    U: UserDirectory,
    E: EmailSender,
    C: ChatSender,
    P: PushSender,
    W: WebhookClient,
    M: ContextMapper,
{
    #[tracing::instrument(skip(self, kind, config, payload), fields(action = %kind))]
    async fn guarded(
        &self,
        kind: &ActionKind,
        config: &Value,
        payload: &Value,
        event_name: &str,
    ) -> ActionOutcome {
        let attempt = AssertUnwindSafe(self.attempt(kind, config, payload, event_name))
            .catch_unwind()
            .await;
        let outcome = match attempt {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::warn!(kind = ?err.kind(), error = %err, "action failed");
                ActionOutcome::failed(err.to_string())
            }
            Err(panic) => {
                let err = ActionError::Panicked(panic_message(panic.as_ref()));
                tracing::error!(error = %err, "action panicked");
                ActionOutcome::failed(err.to_string())
            }
        };
        if outcome.success {
            tracing::debug!(partial = ?outcome.error, "action succeeded");
        }
        outcome
    }

    async fn attempt(
        &self,
        kind: &ActionKind,
        config: &Value,
        payload: &Value,
        event_name: &str,
    ) -> Result<ActionOutcome, ActionError> {
        match ActionConfig::parse(kind, config)? {
            ActionConfig::Email(config) => self.send_email(config, payload, event_name).await,
            ActionConfig::WhatsApp(config) => {
                self.send_whatsapp(config, payload, event_name).await
            }
            ActionConfig::Push(config) => self.send_push(config, payload, event_name).await,
            ActionConfig::Webhook(config) => self.call_webhook(config, payload, event_name).await,
        }
    }

    async fn send_email(
        &self,
        config: EmailActionConfig,
        payload: &Value,
        event_name: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let template_id = config
            .template_id
            .ok_or(ActionError::EmailTemplateMissing)?;
        let to = resolve_email(payload).ok_or(ActionError::RecipientEmailMissing)?;
        let context = self.mapper.build_context(payload, event_name);
        let report = self
            .channels
            .email
            .send(&template_id, &to, &context)
            .await
            .map_err(provider_error)?;
        Ok(report.into())
    }

    async fn send_whatsapp(
        &self,
        config: WhatsAppActionConfig,
        payload: &Value,
        event_name: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let template_id = config
            .template_id
            .ok_or(ActionError::WhatsAppTemplateMissing)?;
        let template = self
            .load_template(&template_id, TemplateChannel::Whatsapp)
            .await?
            .ok_or(ActionError::TemplateNotFound("WhatsApp"))?;
        if !template.is_active {
            return Err(ActionError::TemplateInactive("WhatsApp"));
        }
        let phone = self
            .recipient_phone(payload)
            .await?
            .ok_or(ActionError::RecipientPhoneMissing)?;
        let context = self.mapper.build_context(payload, event_name);
        let message = render(&template.body, &context);
        let report = self
            .channels
            .chat
            .send(&phone, &message)
            .await
            .map_err(provider_error)?;
        Ok(report.into())
    }

    async fn send_push(
        &self,
        config: PushActionConfig,
        payload: &Value,
        event_name: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let mut notification = match config.template_id.as_deref() {
            Some(id) => {
                let template = self
                    .load_template(id, TemplateChannel::Push)
                    .await?
                    .ok_or(ActionError::TemplateNotFound("push"))?;
                if !template.is_active {
                    return Err(ActionError::TemplateInactive("push"));
                }
                let context = self.mapper.build_context(payload, event_name);
                push_from_template(&template, &context)
            }
            None => push_from_config(config),
        };
        notification
            .tag
            .get_or_insert_with(|| format!("kadernim-{event_name}"));

        let report = self
            .channels
            .push
            .send_to_all(&notification)
            .await
            .map_err(provider_error)?;
        if report.total == 0 {
            return Ok(ActionOutcome::failed("Nenhuma inscrição de push ativa"));
        }
        Ok(ActionOutcome {
            success: report.success > 0,
            error: report.failure_summary(),
        })
    }

    async fn call_webhook(
        &self,
        config: WebhookActionConfig,
        payload: &Value,
        event_name: &str,
    ) -> Result<ActionOutcome, ActionError> {
        let url = config.url.ok_or(ActionError::WebhookUrlMissing)?;
        let envelope = json!({
            "event": event_name,
            "timestamp": now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "data": payload,
        });
        let timeout_secs = self.webhook_timeout.as_secs();
        let response = tokio::time::timeout(
            self.webhook_timeout,
            self.channels.webhook.post_json(&url, &envelope),
        )
        .await
        .map_err(|_| ActionError::Timeout(timeout_secs))?
        .map_err(|err| match err {
            WebhookError::Timeout => ActionError::Timeout(timeout_secs),
            WebhookError::Transport(reason) => ActionError::Provider(reason),
        })?;

        if response.is_success() {
            return Ok(ActionOutcome::succeeded());
        }
        Err(ActionError::HttpStatus {
            status: response.status,
            body: response.body.chars().take(ERROR_BODY_PREVIEW).collect(),
        })
    }

    /// Fetch `raw_id` if it names a template of `channel`.
    async fn load_template(
        &self,
        raw_id: &str,
        channel: TemplateChannel,
    ) -> Result<Option<NotificationTemplate>, ActionError> {
        let Ok(id) = raw_id.parse::<TemplateId>() else {
            return Ok(None);
        };
        let template = self
            .templates
            .get_by_id(id)
            .await
            .map_err(|err| lookup_error("template", &err))?;
        Ok(template.filter(|t| t.channel == channel))
    }

    async fn recipient_phone(&self, payload: &Value) -> Result<Option<String>, ActionError> {
        match resolve_phone(payload) {
            PhoneSource::Direct(phone) => Ok(Some(phone)),
            PhoneSource::User(user_id) => {
                let user = self
                    .users
                    .find_by_id(&user_id)
                    .await
                    .map_err(|err| lookup_error("usuário", &err))?;
                Ok(user
                    .and_then(|u| u.phone)
                    .filter(|phone| !phone.trim().is_empty()))
            }
            PhoneSource::Missing => Ok(None),
        }
    }
}

impl<T, U, E, C, P, W, M> Executor for ActionExecutor<T, U, E, C, P, W, M>
where
    T: TemplateRepository,
    U: UserDirectory,
    E: EmailSender,
    C: ChatSender,
    P: PushSender,
    W: WebhookClient,
    M: ContextMapper,
{
    fn execute(
        &self,
        kind: &ActionKind,
        config: &Value,
        payload: &Value,
        event_name: &str,
    ) -> impl Future<Output = ActionOutcome> + Send {
        self.guarded(kind, config, payload, event_name)
    }
}

fn push_from_template(template: &NotificationTemplate, context: &Value) -> PushPayload {
    let rendered = template.render(context);
    PushPayload {
        title: rendered
            .title
            .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string()),
        body: rendered.body,
        url: rendered.url.unwrap_or_else(|| DEFAULT_PUSH_URL.to_string()),
        icon: template.icon.clone(),
        badge: template.badge.clone(),
        image: template.image.clone(),
        tag: template.tag.clone(),
    }
}

fn push_from_config(config: PushActionConfig) -> PushPayload {
    PushPayload {
        title: config
            .title
            .unwrap_or_else(|| DEFAULT_PUSH_TITLE.to_string()),
        body: config.body.unwrap_or_else(|| DEFAULT_PUSH_BODY.to_string()),
        url: config.url.unwrap_or_else(|| DEFAULT_PUSH_URL.to_string()),
        icon: config.icon,
        badge: config.badge,
        image: config.image,
        tag: config.tag,
    }
}

#[allow(clippy::needless_pass_by_value)]
fn provider_error(err: KadernimError) -> ActionError {
    ActionError::Provider(describe(&err))
}

fn lookup_error(what: &'static str, err: &KadernimError) -> ActionError {
    ActionError::Lookup {
        what,
        reason: describe(err),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}
