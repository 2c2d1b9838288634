//! Delivery ports: the outbound channels actions deliver through.
//!
//! Email and chat senders answer with a [`DeliveryReport`] for outcomes the
//! provider reports, and with an `Err` only when the transport itself
//! failed. A channel left unconfigured is wired as `None`; the `Option`
//! impls below turn every call into a "not configured" failure.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use kadernim_domain::error::KadernimError;
use kadernim_domain::push::{PushFanoutReport, PushPayload, PushReport, PushTarget};

/// What a provider said about one delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub success: bool,
    pub error: Option<String>,
}

impl DeliveryReport {
    #[must_use]
    pub fn delivered() -> Self {
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

/// Returned by a channel that was not configured.
#[derive(Debug, thiserror::Error)]
#[error("Canal de {0} não configurado")]
pub struct ChannelDisabled(pub &'static str);

/// Sends stored email templates.
pub trait EmailSender: Send + Sync {
    /// Render template `template_id` against `context` and send it to `to`.
    fn send(
        &self,
        template_id: &str,
        to: &str,
        context: &Value,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send;
}

/// Sends plain chat messages (WhatsApp).
pub trait ChatSender: Send + Sync {
    fn send(
        &self,
        phone: &str,
        message: &str,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send;
}

/// Web-push delivery.
pub trait PushSender: Send + Sync {
    /// Deliver to every active subscription.
    fn send_to_all(
        &self,
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushReport, KadernimError>> + Send;

    /// Deliver to an explicit set of subscriptions.
    fn send_to_subscriptions(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushFanoutReport, KadernimError>> + Send;
}

/// Response of a webhook endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("tempo limite excedido")]
    Timeout,

    #[error("{0}")]
    Transport(String),
}

/// Plain HTTP client for webhook calls.
pub trait WebhookClient: Send + Sync {
    /// POST `body` as `application/json`.
    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<HttpResponse, WebhookError>> + Send;
}

impl<T: EmailSender> EmailSender for std::sync::Arc<T> {
    fn send(
        &self,
        template_id: &str,
        to: &str,
        context: &Value,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send {
        (**self).send(template_id, to, context)
    }
}

impl<T: PushSender> PushSender for std::sync::Arc<T> {
    fn send_to_all(
        &self,
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushReport, KadernimError>> + Send {
        (**self).send_to_all(payload)
    }

    fn send_to_subscriptions(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushFanoutReport, KadernimError>> + Send {
        (**self).send_to_subscriptions(targets, payload)
    }
}

impl<T: EmailSender> EmailSender for Option<T> {
    fn send(
        &self,
        template_id: &str,
        to: &str,
        context: &Value,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send {
        async move {
            match self {
                Some(inner) => inner.send(template_id, to, context).await,
                None => Ok(DeliveryReport::failed(ChannelDisabled("email").to_string())),
            }
        }
    }
}

impl<T: ChatSender> ChatSender for Option<T> {
    fn send(
        &self,
        phone: &str,
        message: &str,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send {
        async move {
            match self {
                Some(inner) => inner.send(phone, message).await,
                None => Ok(DeliveryReport::failed(
                    ChannelDisabled("WhatsApp").to_string(),
                )),
            }
        }
    }
}

impl<T: PushSender> PushSender for Option<T> {
    fn send_to_all(
        &self,
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushReport, KadernimError>> + Send {
        async move {
            match self {
                Some(inner) => inner.send_to_all(payload).await,
                None => Err(KadernimError::Delivery(Box::new(ChannelDisabled("push")))),
            }
        }
    }

    fn send_to_subscriptions(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushFanoutReport, KadernimError>> + Send {
        async move {
            match self {
                Some(inner) => inner.send_to_subscriptions(targets, payload).await,
                None => Err(KadernimError::Delivery(Box::new(ChannelDisabled("push")))),
            }
        }
    }
}
