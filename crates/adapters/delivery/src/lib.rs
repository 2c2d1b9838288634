//! # kadernim-adapter-delivery
//!
//! Concrete delivery channels behind the ports in
//! `kadernim-app::ports::delivery`.
//!
//! ## Responsibilities
//! - POST webhook envelopes with [reqwest](https://docs.rs/reqwest)
//! - Render stored email templates and send them over SMTP with
//!   [lettre](https://docs.rs/lettre)
//! - Forward WhatsApp messages to an HTTP gateway
//! - Forward web-push payloads to a push relay, one request per subscription
//!
//! ## Dependency rule
//! Depends on `kadernim-app` (for port traits) and `kadernim-domain` (for
//! templates and push types). Nothing in `app` or `domain` references this
//! crate.

pub mod email;
pub mod error;
pub mod push;
pub mod webhook;
pub mod whatsapp;

#[cfg(test)]
mod test_server;

pub use email::{SmtpConfig, SmtpMailer};
pub use error::{EmailError, GatewayError};
pub use push::{PushRelay, PushRelayConfig};
pub use webhook::HttpWebhookClient;
pub use whatsapp::{WhatsAppConfig, WhatsAppGateway};
