//! Notification templates: stored strings with `{{path}}` placeholders.
//!
//! One template targets one channel. Templates are read-only while
//! automations execute; authoring happens in the admin UI.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{KadernimError, ValidationError};
use crate::id::TemplateId;
use crate::render::{render, render_opt};

/// Delivery channel a template is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateChannel {
    Email,
    Whatsapp,
    Push,
}

impl TemplateChannel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Whatsapp => "whatsapp",
            Self::Push => "push",
        }
    }
}

impl fmt::Display for TemplateChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateChannel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "whatsapp" => Ok(Self::Whatsapp),
            "push" => Ok(Self::Push),
            other => Err(ValidationError::UnknownValue {
                kind: "template channel",
                value: other.to_string(),
            }),
        }
    }
}

/// A stored notification template.
///
/// `subject` is used by email, `title` and the visual fields by push;
/// channels ignore the fields they have no use for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub id: TemplateId,
    pub channel: TemplateChannel,
    pub event_type: String,
    pub name: String,
    pub subject: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
    pub is_active: bool,
}

/// A template with every text field rendered against a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub subject: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub url: Option<String>,
}

impl NotificationTemplate {
    /// Start a template for `channel` with only a body.
    #[must_use]
    pub fn new(
        channel: TemplateChannel,
        event_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            id: TemplateId::new(),
            channel,
            name: event_type.clone(),
            event_type,
            subject: None,
            title: None,
            body: body.into(),
            url: None,
            icon: None,
            badge: None,
            image: None,
            tag: None,
            is_active: true,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyBody`] when the body is blank.
    pub fn validate(&self) -> Result<(), KadernimError> {
        if self.body.trim().is_empty() {
            return Err(ValidationError::EmptyBody.into());
        }
        Ok(())
    }

    /// Render the subject, title, body and url against `context`.
    #[must_use]
    pub fn render(&self, context: &serde_json::Value) -> RenderedTemplate {
        RenderedTemplate {
            subject: render_opt(self.subject.as_deref(), context),
            title: render_opt(self.title.as_deref(), context),
            body: render(&self.body, context),
            url: render_opt(self.url.as_deref(), context),
        }
    }
}
