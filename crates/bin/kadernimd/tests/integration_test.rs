//! End-to-end tests for the full kadernimd stack.
//!
//! Each test wires the complete application (in-memory `SQLite`, real repos,
//! real worker, real axum router) and exercises the HTTP layer via
//! `tower::ServiceExt::oneshot`. Webhook actions post to a local axum server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use kadernim_adapter_delivery::{HttpWebhookClient, PushRelay, SmtpMailer, WhatsAppGateway};
use kadernim_adapter_http_axum::router;
use kadernim_adapter_http_axum::state::AppState;
use kadernim_adapter_storage_sqlite_sqlx::{
    Config, SqliteCampaignRepository, SqliteExecutionLogRepository, SqliteRuleRepository,
    SqliteStepJournal, SqliteSubscriptionRepository, SqliteTemplateRepository,
    SqliteUserDirectory,
};
use kadernim_app::campaign_scheduler::CampaignScheduler;
use kadernim_app::dispatcher::RuleDispatcher;
use kadernim_app::event_bus::{InProcessEventBus, JournaledPublisher};
use kadernim_app::executor::{ActionExecutor, Channels};
use kadernim_app::otp::OtpService;
use kadernim_app::worker::{RetryPolicies, Worker};
use kadernim_domain::automation::{Action, ActionKind, AutomationRule};
use kadernim_domain::context::AppInfo;
use kadernim_domain::durable::RunStatus;
use kadernim_domain::event::names;
use kadernim_domain::id::{CampaignId, RunId};

/// A running stack; the worker stops when this is dropped.
struct Stack {
    app: Router,
    rules: SqliteRuleRepository,
    journal: SqliteStepJournal,
    shutdown: CancellationToken,
}

impl Drop for Stack {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn stack() -> Stack {
    let db = Config {
        database_url: "sqlite::memory:".to_string(),
    }
    .build()
    .await
    .expect("in-memory database should initialise");
    let pool = db.pool().clone();

    let rules = SqliteRuleRepository::new(pool.clone());
    let templates = SqliteTemplateRepository::new(pool.clone());
    let execution_logs = SqliteExecutionLogRepository::new(pool.clone());
    let users = SqliteUserDirectory::new(pool.clone());
    let subscriptions = SqliteSubscriptionRepository::new(pool.clone());
    let campaigns = SqliteCampaignRepository::new(pool.clone());
    let journal = SqliteStepJournal::new(pool);

    let email = None::<Arc<SmtpMailer<SqliteTemplateRepository>>>;
    let push = None::<Arc<PushRelay<SqliteSubscriptionRepository>>>;
    let executor = ActionExecutor::new(
        templates.clone(),
        users.clone(),
        Channels {
            email: email.clone(),
            chat: None::<WhatsAppGateway>,
            push: push.clone(),
            webhook: HttpWebhookClient::new().unwrap(),
        },
        AppInfo::default(),
    );
    let worker = Arc::new(Worker::new(
        journal.clone(),
        OtpService::new(templates, users, email, AppInfo::default()),
        CampaignScheduler::new(campaigns, subscriptions, push),
        RuleDispatcher::new(rules.clone(), execution_logs.clone(), executor),
        RetryPolicies::default(),
    ));

    let event_bus = InProcessEventBus::new(64);
    let shutdown = CancellationToken::new();
    tokio::spawn(worker.run(event_bus.subscribe(), shutdown.clone()));

    let publisher = JournaledPublisher::new(journal.clone(), event_bus);
    let app = router::build(AppState::new(publisher, execution_logs, rules.clone()));
    Stack {
        app,
        rules,
        journal,
        shutdown,
    }
}

/// Local webhook endpoint recording every body it receives.
async fn webhook_sink() -> (String, Arc<Mutex<Vec<Value>>>) {
    let received: Arc<Mutex<Vec<Value>>> = Arc::default();
    let sink = Arc::clone(&received);
    let app = Router::new().route(
        "/hook",
        post(move |Json(body): Json<Value>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().unwrap().push(body);
                StatusCode::OK
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), received)
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Poll `/api/executions` until `count` rows exist.
async fn wait_for_executions(app: &Router, count: usize) -> Vec<Value> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let (_, body) = call(app, get("/api/executions")).await;
            let rows = body.as_array().cloned().unwrap_or_default();
            if rows.len() >= count {
                return rows;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("executions should be logged")
}

async fn wait_for_run(journal: &SqliteStepJournal, id: RunId) -> RunStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(run) = journal.get(id).await.unwrap() {
                if run.status.is_finished() {
                    return run.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("run should finish")
}

fn rule(event_type: &str, priority: i32, action: Action) -> AutomationRule {
    AutomationRule::builder()
        .name(format!("{event_type} #{priority}"))
        .event_type(event_type)
        .priority(priority)
        .action(action)
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_return_ok_when_health_check_called() {
    let stack = stack().await;
    let response = stack.app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Event intake → rules → execution log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_run_webhook_rule_for_published_event() {
    let stack = stack().await;
    let (url, received) = webhook_sink().await;
    stack
        .rules
        .insert(&rule(
            names::USER_SIGNUP,
            0,
            Action::new(ActionKind::WebhookCall, json!({ "url": url })),
        ))
        .await
        .unwrap();

    let (status, body) = call(
        &stack.app,
        post_json(
            "/api/events",
            &json!({"name": "user.signup", "data": {"email": "ana@x.com"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body["id"].is_string());

    let rows = wait_for_executions(&stack.app, 1).await;
    assert_eq!(rows[0]["status"], "success");
    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "user.signup");
    assert_eq!(received[0]["data"]["email"], "ana@x.com");
}

#[tokio::test]
async fn should_log_failure_for_unconfigured_channel() {
    let stack = stack().await;
    stack
        .rules
        .insert(&rule(
            names::USER_LOGIN,
            0,
            Action::new(ActionKind::WhatsAppSend, json!({"templateId": "missing"})),
        ))
        .await
        .unwrap();

    let (status, _) = call(
        &stack.app,
        post_json("/api/events", &json!({"name": "user.login", "data": {"phone": "+55"}})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let rows = wait_for_executions(&stack.app, 1).await;
    assert_eq!(rows[0]["status"], "failed");
    assert!(rows[0]["error"].is_string());
}

#[tokio::test]
async fn should_complete_run_without_logs_when_no_rule_matches() {
    let stack = stack().await;

    let (status, body) = call(
        &stack.app,
        post_json("/api/events", &json!({"name": "resource.created", "data": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let run_id: RunId = serde_json::from_value(body["id"].clone()).unwrap();
    assert!(stack.journal.get(run_id).await.unwrap().is_some());
    assert_eq!(wait_for_run(&stack.journal, run_id).await, RunStatus::Completed);
    let (_, logs) = call(&stack.app, get("/api/executions")).await;
    assert_eq!(logs, json!([]));
}

// ---------------------------------------------------------------------------
// Read side
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_list_active_rules_in_priority_order() {
    let stack = stack().await;
    let webhook = || Action::new(ActionKind::WebhookCall, json!({"url": "http://x"}));
    stack
        .rules
        .insert(&rule(names::RESOURCE_PUBLISHED, 5, webhook()))
        .await
        .unwrap();
    stack
        .rules
        .insert(&rule(names::RESOURCE_PUBLISHED, 1, webhook()))
        .await
        .unwrap();

    let (status, body) = call(&stack.app, get("/api/rules?event=resource.published")).await;

    assert_eq!(status, StatusCode::OK);
    let priorities: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["priority"].as_i64().unwrap())
        .collect();
    assert_eq!(priorities, vec![1, 5]);
}

// ---------------------------------------------------------------------------
// Campaigns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn should_fail_run_for_unknown_campaign() {
    let stack = stack().await;

    let (status, body) = call(
        &stack.app,
        post_json(
            &format!("/api/campaigns/{}/schedule", CampaignId::new()),
            &json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let run_id: RunId = serde_json::from_value(body["id"].clone()).unwrap();
    assert_eq!(wait_for_run(&stack.journal, run_id).await, RunStatus::Failed);
}
