//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod context;
pub mod delivery;
pub mod event_bus;
pub mod journal;
pub mod storage;

pub use context::ContextMapper;
pub use delivery::{
    ChannelDisabled, ChatSender, DeliveryReport, EmailSender, HttpResponse, PushSender,
    WebhookClient, WebhookError,
};
pub use event_bus::EventPublisher;
pub use journal::StepJournal;
pub use storage::{
    CampaignRepository, ExecutionLogRepository, RuleRepository, SubscriptionRepository,
    TemplateRepository, UserDirectory,
};
