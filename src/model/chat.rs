use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// A manual broadcast: one sender, one content blob, many receivers.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ChatBroadcast {
    pub id: u64,
    #[schema(example = "hr@company.com")]
    pub sender: String,
    pub content: String,
    /// When set, the receiver table is ignored and the broadcast goes to
    /// every enabled user account.
    pub select_all_users: bool,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
pub enum QueueStatus {
    Pending,
    Sent,
    Failed,
}

/// One queued delivery. Rows are written in bulk at send time and drained
/// by the background worker.
#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct ChatQueueItem {
    pub id: u64,
    pub broadcast_id: u64,
    pub sender: String,
    pub receiver: String,
    pub content: String,
    #[schema(example = "Pending")]
    pub status: String,
    pub error: Option<String>,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}
