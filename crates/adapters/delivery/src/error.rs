//! Delivery-specific error types.
//!
//! These describe transport failures only. A provider that answers with a
//! rejection produces a failed [`DeliveryReport`](kadernim_app::ports::DeliveryReport)
//! instead.

use kadernim_domain::error::KadernimError;

/// Errors raised while talking to the SMTP server.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// Connection, TLS or authentication failure.
    #[error("SMTP transport error")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The sender or recipient address could not be parsed.
    #[error("invalid email address")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("failed to build email message")]
    Build(#[from] lettre::error::Error),
}

impl From<EmailError> for KadernimError {
    fn from(err: EmailError) -> Self {
        Self::Delivery(Box::new(err))
    }
}

/// Errors raised while talking to an HTTP gateway (WhatsApp or push relay).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway request failed")]
    Request(#[from] reqwest::Error),

    #[error("gateway answered with an unreadable body")]
    Decode(#[source] serde_json::Error),
}

impl From<GatewayError> for KadernimError {
    fn from(err: GatewayError) -> Self {
        Self::Delivery(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_map_gateway_errors_to_retryable_delivery_errors() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: KadernimError = GatewayError::Decode(decode).into();
        assert!(matches!(err, KadernimError::Delivery(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn should_keep_address_error_in_source_chain() {
        let parse: Result<lettre::Address, _> = "not-an-email".parse();
        let err: KadernimError = EmailError::Address(parse.unwrap_err()).into();
        let text = kadernim_domain::error::describe(&err);
        assert!(text.contains("invalid email address"));
    }
}
