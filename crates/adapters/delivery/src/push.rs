//! Web-push delivery through an HTTP relay.
//!
//! The relay owns the VAPID keys and the Web Push encryption. Each
//! subscription is one `POST {relay_url}` carrying
//! `{"subscription": {"endpoint", "keys": {"auth", "p256dh"}}, "payload"}`;
//! any 2xx answer counts as delivered.

use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;

use kadernim_app::ports::{PushSender, SubscriptionRepository};
use kadernim_domain::error::KadernimError;
use kadernim_domain::push::{PushFanoutReport, PushPayload, PushReport, PushTarget};

use crate::error::GatewayError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests in flight at once during a fan-out.
const CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRelayConfig {
    pub relay_url: String,
    pub token: Option<String>,
}

#[derive(Serialize)]
struct Keys<'a> {
    auth: &'a str,
    p256dh: &'a str,
}

#[derive(Serialize)]
struct Subscription<'a> {
    endpoint: &'a str,
    keys: Keys<'a>,
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    subscription: Subscription<'a>,
    payload: &'a PushPayload,
}

/// Pushes to subscriptions read from `S`.
pub struct PushRelay<S> {
    client: reqwest::Client,
    config: PushRelayConfig,
    subscriptions: S,
}

impl<S: SubscriptionRepository> PushRelay<S> {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: PushRelayConfig, subscriptions: S) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            config,
            subscriptions,
        })
    }

    async fn deliver(&self, target: &PushTarget, payload: &PushPayload) -> bool {
        let body = RelayRequest {
            subscription: Subscription {
                endpoint: &target.endpoint,
                keys: Keys {
                    auth: &target.auth,
                    p256dh: &target.p256dh,
                },
            },
            payload,
        };
        let mut request = self.client.post(&self.config.relay_url).json(&body);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        match request.send().await {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(
                    subscription_id = %target.subscription_id,
                    status = response.status().as_u16(),
                    "push relay refused subscription"
                );
                false
            }
            Err(err) => {
                tracing::warn!(
                    subscription_id = %target.subscription_id,
                    error = %err,
                    "push relay unreachable"
                );
                false
            }
        }
    }
}

impl<S: SubscriptionRepository> PushSender for PushRelay<S> {
    async fn send_to_all(&self, payload: &PushPayload) -> Result<PushReport, KadernimError> {
        let targets = self.subscriptions.active_targets().await?;
        let report = self.send_to_subscriptions(&targets, payload).await?;
        Ok(PushReport {
            success: report.success,
            failed: report.failed,
            total: targets.len() as u64,
        })
    }

    #[tracing::instrument(skip_all, fields(targets = targets.len()))]
    async fn send_to_subscriptions(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> Result<PushFanoutReport, KadernimError> {
        let deliveries: Vec<_> = targets
            .iter()
            .map(|target| async move {
                (target.user_id.clone(), self.deliver(target, payload).await)
            })
            .collect();
        let outcomes: Vec<_> = stream::iter(deliveries)
            .buffer_unordered(CONCURRENCY)
            .collect()
            .await;
        let report = PushFanoutReport::from_outcomes(outcomes);
        tracing::debug!(success = report.success, failed = report.failed, "push fan-out done");
        Ok(report)
    }
}
