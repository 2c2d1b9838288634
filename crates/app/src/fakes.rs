//! In-memory port implementations shared by the unit tests of this crate.
//!
//! Every fake is `Clone` and shares its state, so a test can hand one copy
//! to the service under test and inspect the other afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use kadernim_domain::audience::AudienceFilter;
use kadernim_domain::automation::AutomationRule;
use kadernim_domain::campaign::{CampaignStatus, PushCampaign};
use kadernim_domain::durable::{RunRecord, RunStatus};
use kadernim_domain::error::KadernimError;
use kadernim_domain::execution_log::ExecutionLog;
use kadernim_domain::id::{CampaignId, RuleId, RunId, TemplateId, UserId};
use kadernim_domain::push::{PushFanoutReport, PushPayload, PushReport, PushTarget};
use kadernim_domain::template::{NotificationTemplate, TemplateChannel};
use kadernim_domain::time::{Timestamp, now};
use kadernim_domain::user::User;

use crate::ports::{
    CampaignRepository, ChatSender, DeliveryReport, EmailSender, ExecutionLogRepository,
    HttpResponse, PushSender, RuleRepository, StepJournal, SubscriptionRepository,
    TemplateRepository, UserDirectory, WebhookClient, WebhookError,
};

pub(crate) fn storage_down() -> KadernimError {
    KadernimError::Storage(Box::new(std::io::Error::other("database unavailable")))
}

// Storage

#[derive(Clone, Default)]
pub(crate) struct InMemoryRules {
    rules: Arc<Mutex<Vec<AutomationRule>>>,
}

impl InMemoryRules {
    pub(crate) fn with(rules: Vec<AutomationRule>) -> Self {
        Self {
            rules: Arc::new(Mutex::new(rules)),
        }
    }
}

impl RuleRepository for InMemoryRules {
    fn find_active_by_event(
        &self,
        event_type: &str,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, KadernimError>> + Send {
        let result: Vec<AutomationRule> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.matches(event_type))
            .cloned()
            .collect();
        async { Ok(result) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryTemplates {
    store: Arc<Mutex<HashMap<TemplateId, NotificationTemplate>>>,
}

impl InMemoryTemplates {
    pub(crate) fn with(templates: Vec<NotificationTemplate>) -> Self {
        Self {
            store: Arc::new(Mutex::new(
                templates.into_iter().map(|t| (t.id, t)).collect(),
            )),
        }
    }
}

impl TemplateRepository for InMemoryTemplates {
    fn get_by_id(
        &self,
        id: TemplateId,
    ) -> impl Future<Output = Result<Option<NotificationTemplate>, KadernimError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn find_active(
        &self,
        channel: TemplateChannel,
        event_type: &str,
    ) -> impl Future<Output = Result<Option<NotificationTemplate>, KadernimError>> + Send {
        let result = self
            .store
            .lock()
            .unwrap()
            .values()
            .find(|t| t.is_active && t.channel == channel && t.event_type == event_type)
            .cloned();
        async { Ok(result) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryLogs {
    rows: Arc<Mutex<Vec<ExecutionLog>>>,
    failing: bool,
}

impl InMemoryLogs {
    pub(crate) fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub(crate) fn rows(&self) -> Vec<ExecutionLog> {
        self.rows.lock().unwrap().clone()
    }
}

impl ExecutionLogRepository for InMemoryLogs {
    fn append(&self, log: ExecutionLog) -> impl Future<Output = Result<(), KadernimError>> + Send {
        let result = if self.failing {
            Err(storage_down())
        } else {
            self.rows.lock().unwrap().push(log);
            Ok(())
        };
        async { result }
    }

    fn recent(
        &self,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, KadernimError>> + Send {
        let rows: Vec<ExecutionLog> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect();
        async { Ok(rows) }
    }

    fn for_rule(
        &self,
        rule_id: RuleId,
        limit: u32,
    ) -> impl Future<Output = Result<Vec<ExecutionLog>, KadernimError>> + Send {
        let rows: Vec<ExecutionLog> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|l| l.rule_id == rule_id)
            .take(limit as usize)
            .cloned()
            .collect();
        async { Ok(rows) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryUsers {
    users: Arc<Mutex<Vec<User>>>,
}

impl InMemoryUsers {
    pub(crate) fn with(users: Vec<User>) -> Self {
        Self {
            users: Arc::new(Mutex::new(users)),
        }
    }
}

impl UserDirectory for InMemoryUsers {
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<User>, KadernimError>> + Send {
        let result = self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned();
        async { Ok(result) }
    }

    fn find_by_id(
        &self,
        id: &UserId,
    ) -> impl Future<Output = Result<Option<User>, KadernimError>> + Send {
        let result = self.users.lock().unwrap().iter().find(|u| u.id == *id).cloned();
        async { Ok(result) }
    }
}

/// Subscriptions joined with their owners, filtered in memory.
#[derive(Clone, Default)]
pub(crate) struct InMemorySubscriptions {
    rows: Arc<Mutex<Vec<(PushTarget, User)>>>,
    segment_calls: Arc<Mutex<u32>>,
}

impl InMemorySubscriptions {
    pub(crate) fn with(rows: Vec<(PushTarget, User)>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            ..Self::default()
        }
    }

    pub(crate) fn segment_calls(&self) -> u32 {
        *self.segment_calls.lock().unwrap()
    }
}

impl SubscriptionRepository for InMemorySubscriptions {
    fn active_targets(
        &self,
    ) -> impl Future<Output = Result<Vec<PushTarget>, KadernimError>> + Send {
        let result: Vec<PushTarget> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .map(|(t, _)| t.clone())
            .collect();
        async { Ok(result) }
    }

    fn segment(
        &self,
        filter: &AudienceFilter,
    ) -> impl Future<Output = Result<Vec<PushTarget>, KadernimError>> + Send {
        *self.segment_calls.lock().unwrap() += 1;
        let at = now();
        let result: Vec<PushTarget> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, user)| filter.matches(user, at))
            .map(|(t, _)| t.clone())
            .collect();
        async { Ok(result) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct InMemoryCampaigns {
    store: Arc<Mutex<HashMap<CampaignId, PushCampaign>>>,
}

impl InMemoryCampaigns {
    pub(crate) fn with(campaign: PushCampaign) -> Self {
        let repo = Self::default();
        repo.store.lock().unwrap().insert(campaign.id, campaign);
        repo
    }

    pub(crate) fn current(&self, id: CampaignId) -> PushCampaign {
        self.store.lock().unwrap()[&id].clone()
    }

    pub(crate) fn edit(&self, id: CampaignId, change: impl FnOnce(&mut PushCampaign)) {
        change(self.store.lock().unwrap().get_mut(&id).unwrap());
    }
}

impl CampaignRepository for InMemoryCampaigns {
    fn get(
        &self,
        id: CampaignId,
    ) -> impl Future<Output = Result<Option<PushCampaign>, KadernimError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn begin_sending(
        &self,
        id: CampaignId,
    ) -> impl Future<Output = Result<bool, KadernimError>> + Send {
        let mut store = self.store.lock().unwrap();
        let started = match store.get_mut(&id) {
            Some(c) if c.status == CampaignStatus::Draft => {
                c.status = CampaignStatus::Sending;
                true
            }
            _ => false,
        };
        async move { Ok(started) }
    }

    fn mark_sent(
        &self,
        id: CampaignId,
        total_sent: u64,
        sent_at: Timestamp,
    ) -> impl Future<Output = Result<bool, KadernimError>> + Send {
        let mut store = self.store.lock().unwrap();
        let updated = store
            .get_mut(&id)
            .is_some_and(|c| c.mark_sent(total_sent, sent_at).is_ok());
        async move { Ok(updated) }
    }
}

// Delivery

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SentEmail {
    pub template_id: String,
    pub to: String,
    pub context: Value,
}

#[derive(Clone)]
pub(crate) struct SpyEmail {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    report: DeliveryReport,
}

impl Default for SpyEmail {
    fn default() -> Self {
        Self::answering(DeliveryReport::delivered())
    }
}

impl SpyEmail {
    pub(crate) fn answering(report: DeliveryReport) -> Self {
        Self {
            sent: Arc::default(),
            report,
        }
    }

    pub(crate) fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl EmailSender for SpyEmail {
    fn send(
        &self,
        template_id: &str,
        to: &str,
        context: &Value,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send {
        self.sent.lock().unwrap().push(SentEmail {
            template_id: template_id.to_string(),
            to: to.to_string(),
            context: context.clone(),
        });
        let report = self.report.clone();
        async { Ok(report) }
    }
}

#[derive(Clone, Default)]
pub(crate) struct SpyChat {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl SpyChat {
    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

impl ChatSender for SpyChat {
    fn send(
        &self,
        phone: &str,
        message: &str,
    ) -> impl Future<Output = Result<DeliveryReport, KadernimError>> + Send {
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        async { Ok(DeliveryReport::delivered()) }
    }
}

/// Push sender whose per-device outcome is decided by a predicate on the target.
#[derive(Clone)]
pub(crate) struct SpyPush {
    broadcast_report: PushReport,
    broadcasts: Arc<Mutex<Vec<PushPayload>>>,
    fanouts: Arc<Mutex<Vec<(usize, PushPayload)>>>,
    failing_endpoints: Arc<Vec<String>>,
}

impl Default for SpyPush {
    fn default() -> Self {
        Self::answering(PushReport {
            success: 1,
            failed: 0,
            total: 1,
        })
    }
}

impl SpyPush {
    pub(crate) fn answering(report: PushReport) -> Self {
        Self {
            broadcast_report: report,
            broadcasts: Arc::default(),
            fanouts: Arc::default(),
            failing_endpoints: Arc::default(),
        }
    }

    pub(crate) fn failing_for(endpoints: &[&str]) -> Self {
        Self {
            failing_endpoints: Arc::new(endpoints.iter().map(ToString::to_string).collect()),
            ..Self::default()
        }
    }

    pub(crate) fn broadcasts(&self) -> Vec<PushPayload> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub(crate) fn fanouts(&self) -> Vec<(usize, PushPayload)> {
        self.fanouts.lock().unwrap().clone()
    }
}

impl PushSender for SpyPush {
    fn send_to_all(
        &self,
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushReport, KadernimError>> + Send {
        self.broadcasts.lock().unwrap().push(payload.clone());
        let report = self.broadcast_report;
        async move { Ok(report) }
    }

    fn send_to_subscriptions(
        &self,
        targets: &[PushTarget],
        payload: &PushPayload,
    ) -> impl Future<Output = Result<PushFanoutReport, KadernimError>> + Send {
        self.fanouts
            .lock()
            .unwrap()
            .push((targets.len(), payload.clone()));
        let report = PushFanoutReport::from_outcomes(targets.iter().map(|t| {
            let delivered = !self.failing_endpoints.contains(&t.endpoint);
            (t.user_id.clone(), delivered)
        }));
        async { Ok(report) }
    }
}

/// Webhook client answering with a canned response after an optional delay.
#[derive(Clone)]
pub(crate) struct StubWebhook {
    response: Result<HttpResponse, String>,
    delay: Duration,
    calls: Arc<Mutex<Vec<(String, Value)>>>,
}

impl StubWebhook {
    pub(crate) fn status(status: u16, body: &str) -> Self {
        Self {
            response: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            delay: Duration::ZERO,
            calls: Arc::default(),
        }
    }

    pub(crate) fn refusing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            ..Self::status(200, "")
        }
    }

    pub(crate) fn hanging() -> Self {
        Self {
            delay: Duration::from_secs(3600),
            ..Self::status(200, "")
        }
    }

    pub(crate) fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

impl WebhookClient for StubWebhook {
    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<HttpResponse, WebhookError>> + Send {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        let response = self.response.clone();
        let delay = self.delay;
        async move {
            tokio::time::sleep(delay).await;
            response.map_err(WebhookError::Transport)
        }
    }
}

// Journal

#[derive(Clone, Default)]
pub(crate) struct InMemoryJournal {
    runs: Arc<Mutex<HashMap<RunId, RunRecord>>>,
    steps: Arc<Mutex<HashMap<(RunId, String), Value>>>,
}

impl InMemoryJournal {
    pub(crate) fn run(&self, id: RunId) -> Option<RunRecord> {
        self.runs.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn step(&self, id: RunId, step: &str) -> Option<Value> {
        self.steps
            .lock()
            .unwrap()
            .get(&(id, step.to_string()))
            .cloned()
    }

    pub(crate) fn preload_step(&self, id: RunId, step: &str, output: Value) {
        self.steps
            .lock()
            .unwrap()
            .insert((id, step.to_string()), output);
    }
}

impl StepJournal for InMemoryJournal {
    fn begin_run(
        &self,
        run: RunRecord,
    ) -> impl Future<Output = Result<RunRecord, KadernimError>> + Send {
        let stored = self
            .runs
            .lock()
            .unwrap()
            .entry(run.id)
            .or_insert(run)
            .clone();
        async { Ok(stored) }
    }

    fn load_step(
        &self,
        run_id: RunId,
        step: &str,
    ) -> impl Future<Output = Result<Option<Value>, KadernimError>> + Send {
        let result = self.step(run_id, step);
        async { Ok(result) }
    }

    fn save_step(
        &self,
        run_id: RunId,
        step: &str,
        output: Value,
    ) -> impl Future<Output = Result<(), KadernimError>> + Send {
        self.preload_step(run_id, step, output);
        async { Ok(()) }
    }

    fn finish_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        attempts: u32,
        error: Option<String>,
    ) -> impl Future<Output = Result<(), KadernimError>> + Send {
        if let Some(run) = self.runs.lock().unwrap().get_mut(&run_id) {
            run.status = status;
            run.attempts = attempts;
            run.error = error;
            run.finished_at = Some(now());
        }
        async { Ok(()) }
    }

    fn unfinished_runs(
        &self,
    ) -> impl Future<Output = Result<Vec<RunRecord>, KadernimError>> + Send {
        let mut result: Vec<RunRecord> = self
            .runs
            .lock()
            .unwrap()
            .values()
            .filter(|r| !r.status.is_finished())
            .cloned()
            .collect();
        result.sort_by_key(|r| r.started_at);
        async { Ok(result) }
    }
}

// Builders

pub(crate) fn user(id: &str, email: &str) -> User {
    User {
        id: UserId::new(id),
        email: email.to_string(),
        name: Some("Ana Souza".to_string()),
        phone: None,
        role: "user".to_string(),
        is_subscriber: false,
        last_active_at: None,
    }
}

pub(crate) fn target(endpoint: &str, user_id: &str) -> PushTarget {
    PushTarget {
        subscription_id: kadernim_domain::id::SubscriptionId::new(),
        endpoint: endpoint.to_string(),
        auth: "auth".to_string(),
        p256dh: "key".to_string(),
        user_id: UserId::new(user_id),
    }
}
