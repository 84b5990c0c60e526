//! Pass context management.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::logging::structured::LogContext;

/// Identity and start time of one reconciliation pass.
#[derive(Debug, Clone)]
pub struct PassContext {
    pub pass_id: String,
    pub started_at: DateTime<Utc>,
}

impl PassContext {
    pub fn new() -> Self {
        Self {
            pass_id: format!("pass-{}", &Uuid::new_v4().to_string()[..8]),
            started_at: Utc::now(),
        }
    }

    pub fn log_context(&self) -> LogContext {
        LogContext::new(&self.pass_id)
    }
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new()
    }
}
