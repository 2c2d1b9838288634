//! Default context mapper for automation events.

use serde_json::Value;

use kadernim_domain::context::{AppInfo, automation_context};

use crate::ports::ContextMapper;

/// Exposes the payload at the top level plus `event`, `app`, `data` and
/// a best-effort `user` namespace.
#[derive(Debug, Clone, Default)]
pub struct DefaultContextMapper {
    app: AppInfo,
}

impl DefaultContextMapper {
    #[must_use]
    pub fn new(app: AppInfo) -> Self {
        Self { app }
    }

    #[must_use]
    pub fn app(&self) -> &AppInfo {
        &self.app
    }
}

impl ContextMapper for DefaultContextMapper {
    fn build_context(&self, payload: &Value, event_name: &str) -> Value {
        automation_context(payload, event_name, &self.app)
    }
}
