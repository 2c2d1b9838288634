//! # kadernimd
//!
//! Kadernim automation daemon.
//!
//! Composition root that wires all adapters together and starts the
//! durable worker and the HTTP intake API.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repositories and delivery channels (adapters)
//! - Construct the executor, dispatcher, campaign scheduler and OTP service
//! - Run the worker on the event bus and serve the axum router
//! - Handle graceful shutdown (SIGTERM/SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use kadernim_adapter_delivery::{HttpWebhookClient, PushRelay, SmtpMailer, WhatsAppGateway};
use kadernim_adapter_http_axum::state::AppState;
use kadernim_adapter_storage_sqlite_sqlx::{
    SqliteCampaignRepository, SqliteExecutionLogRepository, SqliteRuleRepository,
    SqliteStepJournal, SqliteSubscriptionRepository, SqliteTemplateRepository,
    SqliteUserDirectory,
};
use kadernim_app::campaign_scheduler::CampaignScheduler;
use kadernim_app::dispatcher::RuleDispatcher;
use kadernim_app::event_bus::{InProcessEventBus, JournaledPublisher};
use kadernim_app::executor::{ActionExecutor, Channels};
use kadernim_app::otp::OtpService;
use kadernim_app::worker::Worker;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|err| {
            eprintln!("invalid log filter {:?}: {err}", config.logging.filter);
            EnvFilter::new("info")
        }))
        .init();

    // Database
    let db = kadernim_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("opening database")?;
    let pool = db.pool().clone();

    // Repositories
    let rules = SqliteRuleRepository::new(pool.clone());
    let templates = SqliteTemplateRepository::new(pool.clone());
    let execution_logs = SqliteExecutionLogRepository::new(pool.clone());
    let users = SqliteUserDirectory::new(pool.clone());
    let subscriptions = SqliteSubscriptionRepository::new(pool.clone());
    let campaigns = SqliteCampaignRepository::new(pool.clone());
    let journal = SqliteStepJournal::new(pool);

    // Delivery channels
    let email = config
        .smtp
        .clone()
        .map(|smtp| SmtpMailer::new(smtp.into(), templates.clone()).map(Arc::new))
        .transpose()
        .context("configuring SMTP")?;
    let chat = config
        .whatsapp
        .clone()
        .map(|whatsapp| WhatsAppGateway::new(whatsapp.into()))
        .transpose()
        .context("configuring WhatsApp gateway")?;
    let push = config
        .push
        .clone()
        .map(|push| PushRelay::new(push.into(), subscriptions.clone()).map(Arc::new))
        .transpose()
        .context("configuring push relay")?;
    let webhook = HttpWebhookClient::new().context("building webhook client")?;
    for (channel, enabled) in [
        ("email", email.is_some()),
        ("whatsapp", chat.is_some()),
        ("push", push.is_some()),
    ] {
        if !enabled {
            tracing::warn!(channel, "delivery channel not configured, its actions will fail");
        }
    }

    // Services
    let app_info = config.app_info();
    let executor = ActionExecutor::new(
        templates.clone(),
        users.clone(),
        Channels {
            email: email.clone(),
            chat,
            push: push.clone(),
            webhook,
        },
        app_info.clone(),
    );
    let dispatcher = RuleDispatcher::new(rules.clone(), execution_logs.clone(), executor);
    let otp = OtpService::new(templates, users, email, app_info);
    let scheduler = CampaignScheduler::new(campaigns, subscriptions, push);
    let worker = Arc::new(Worker::new(
        journal.clone(),
        otp,
        scheduler,
        dispatcher,
        config.worker.retry_policies()?,
    ));

    // Event bus + worker
    let event_bus = InProcessEventBus::default();
    let shutdown = CancellationToken::new();
    let worker_task = tokio::spawn(worker.run(event_bus.subscribe(), shutdown.clone()));

    // HTTP: accepted events are journaled before the worker is woken.
    let publisher = JournaledPublisher::new(journal, event_bus);
    let state = AppState::new(publisher, execution_logs, rules);
    let app = kadernim_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!(%bind_addr, "kadernimd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    worker_task.await?.context("worker stopped with an error")?;
    tracing::info!("kadernimd stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, or when `shutdown` is cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received ctrl-c"),
        () = terminate => tracing::info!("received SIGTERM"),
        () = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
