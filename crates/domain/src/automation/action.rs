//! Action: one typed, side-effecting delivery performed when a rule fires.
//!
//! The stored `config` blob is authored through a loosely-typed admin form,
//! so it is kept as raw JSON on the [`Action`] and re-validated into an
//! [`ActionConfig`] every time the action executes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::ActionId;

/// The delivery channel of an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    EmailSend,
    WhatsAppSend,
    PushNotification,
    WebhookCall,
    /// A type string this engine does not know how to execute.
    Unknown(String),
}

impl ActionKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailSend => "EMAIL_SEND",
            Self::WhatsAppSend => "WHATSAPP_SEND",
            Self::PushNotification => "PUSH_NOTIFICATION",
            Self::WebhookCall => "WEBHOOK_CALL",
            Self::Unknown(other) => other,
        }
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "EMAIL_SEND" => Self::EmailSend,
            "WHATSAPP_SEND" => Self::WhatsAppSend,
            "PUSH_NOTIFICATION" => Self::PushNotification,
            "WEBHOOK_CALL" => Self::WebhookCall,
            _ => Self::Unknown(value),
        }
    }
}

impl From<ActionKind> for String {
    fn from(value: ActionKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored action belonging to exactly one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    pub kind: ActionKind,
    /// Raw configuration as authored; see [`ActionConfig::parse`].
    #[serde(default)]
    pub config: serde_json::Value,
    /// Execution order inside the owning rule (ascending).
    #[serde(default)]
    pub position: u32,
}

impl Action {
    /// Create an action with a fresh id at position 0.
    #[must_use]
    pub fn new(kind: ActionKind, config: serde_json::Value) -> Self {
        Self {
            id: ActionId::new(),
            kind,
            config,
            position: 0,
        }
    }

    /// Re-validate the stored configuration for this action's kind.
    ///
    /// # Errors
    ///
    /// See [`ActionConfig::parse`].
    pub fn parsed_config(&self) -> Result<ActionConfig, ConfigError> {
        ActionConfig::parse(&self.kind, &self.config)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.position)
    }
}

/// Why a stored configuration could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown action type: {0}")]
    UnknownKind(String),

    #[error("Configuração inválida para {kind}: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration of an `EMAIL_SEND` action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmailActionConfig {
    pub template_id: Option<String>,
}

/// Configuration of a `WHATSAPP_SEND` action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WhatsAppActionConfig {
    pub template_id: Option<String>,
}

/// Configuration of a `PUSH_NOTIFICATION` action.
///
/// With a `template_id` the literal fields are ignored except as fallbacks
/// for the template's visual fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PushActionConfig {
    pub template_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub image: Option<String>,
    pub tag: Option<String>,
}

/// Configuration of a `WEBHOOK_CALL` action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookActionConfig {
    pub url: Option<String>,
}

/// Validated, kind-specific configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionConfig {
    Email(EmailActionConfig),
    WhatsApp(WhatsAppActionConfig),
    Push(PushActionConfig),
    Webhook(WebhookActionConfig),
}

impl ActionConfig {
    /// Read a raw configuration blob for `kind`.
    ///
    /// `null` is treated as an empty object and blank strings as absent,
    /// since the authoring form submits both for untouched fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownKind`] for unrecognised kinds and
    /// [`ConfigError::Malformed`] when fields have the wrong JSON type.
    pub fn parse(kind: &ActionKind, raw: &serde_json::Value) -> Result<Self, ConfigError> {
        let raw = normalize(raw);
        let malformed = |source| ConfigError::Malformed {
            kind: kind.to_string(),
            source,
        };
        match kind {
            ActionKind::EmailSend => serde_json::from_value(raw)
                .map(Self::Email)
                .map_err(malformed),
            ActionKind::WhatsAppSend => serde_json::from_value(raw)
                .map(Self::WhatsApp)
                .map_err(malformed),
            ActionKind::PushNotification => serde_json::from_value(raw)
                .map(Self::Push)
                .map_err(malformed),
            ActionKind::WebhookCall => serde_json::from_value(raw)
                .map(Self::Webhook)
                .map_err(malformed),
            ActionKind::Unknown(other) => Err(ConfigError::UnknownKind(other.clone())),
        }
    }
}

fn normalize(raw: &serde_json::Value) -> serde_json::Value {
    match raw {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .filter(|(_, value)| match value {
                    serde_json::Value::Null => false,
                    serde_json::Value::String(s) => !s.trim().is_empty(),
                    _ => true,
                })
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        _ => serde_json::Value::Object(serde_json::Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_known_kinds_from_wire_names() {
        let kinds: Vec<ActionKind> = serde_json::from_value(serde_json::json!([
            "EMAIL_SEND",
            "WHATSAPP_SEND",
            "PUSH_NOTIFICATION",
            "WEBHOOK_CALL"
        ]))
        .unwrap();
        assert_eq!(
            kinds,
            vec![
                ActionKind::EmailSend,
                ActionKind::WhatsAppSend,
                ActionKind::PushNotification,
                ActionKind::WebhookCall,
            ]
        );
    }

    #[test]
    fn should_keep_unrecognised_kind_verbatim() {
        let kind: ActionKind = serde_json::from_value(serde_json::json!("SMS_SEND")).unwrap();
        assert_eq!(kind, ActionKind::Unknown("SMS_SEND".to_string()));
        assert_eq!(serde_json::to_value(&kind).unwrap(), "SMS_SEND");
    }

    #[test]
    fn should_parse_email_config_with_template_id() {
        let config = ActionConfig::parse(
            &ActionKind::EmailSend,
            &serde_json::json!({"templateId": "abc"}),
        )
        .unwrap();
        assert_eq!(
            config,
            ActionConfig::Email(EmailActionConfig {
                template_id: Some("abc".to_string())
            })
        );
    }

    #[test]
    fn should_treat_blank_and_null_fields_as_absent() {
        let config = ActionConfig::parse(
            &ActionKind::WebhookCall,
            &serde_json::json!({"url": "   ", "extra": null}),
        )
        .unwrap();
        assert_eq!(config, ActionConfig::Webhook(WebhookActionConfig::default()));
    }

    #[test]
    fn should_treat_non_object_config_as_empty() {
        let config = ActionConfig::parse(&ActionKind::PushNotification, &serde_json::Value::Null)
            .unwrap();
        assert_eq!(config, ActionConfig::Push(PushActionConfig::default()));
    }

    #[test]
    fn should_reject_wrongly_typed_fields() {
        let err = ActionConfig::parse(
            &ActionKind::WhatsAppSend,
            &serde_json::json!({"templateId": 42}),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert!(err.to_string().starts_with("Configuração inválida para WHATSAPP_SEND"));
    }

    #[test]
    fn should_reject_unknown_kind_with_type_in_message() {
        let err = ActionConfig::parse(
            &ActionKind::Unknown("FAX".to_string()),
            &serde_json::json!({}),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Unknown action type: FAX");
    }

    #[test]
    fn should_display_kind_and_position() {
        let mut action = Action::new(ActionKind::WebhookCall, serde_json::json!({}));
        action.position = 2;
        assert_eq!(action.to_string(), "WEBHOOK_CALL#2");
    }
}
