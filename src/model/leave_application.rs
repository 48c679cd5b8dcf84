use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::workflow::{DocStatus, WorkflowState};

/// One leave application row. `workflow_state` and `docstatus` are stored
/// raw and parsed on demand; a row written by an older workflow revision
/// must not make the whole record unreadable.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveApplication {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "Paid Leave")]
    pub leave_type: String,
    #[schema(example = "2026-01-10", value_type = String, format = "date")]
    pub from_date: NaiveDate,
    #[schema(example = "2026-01-12", value_type = String, format = "date")]
    pub to_date: NaiveDate,
    pub half_day: bool,
    /// Minutes, only meaningful for the Permission leave type.
    #[schema(example = 60.0, nullable = true)]
    pub permission_minutes: Option<f64>,
    #[schema(example = 3.0)]
    pub total_days: f64,
    pub reason: Option<String>,
    pub attachment: Option<String>,
    #[schema(example = "Pending")]
    pub workflow_state: String,
    #[schema(example = 1)]
    pub docstatus: i8,
    #[schema(value_type = String, format = "date-time", nullable = true)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LeaveApplication {
    pub fn state(&self) -> Option<WorkflowState> {
        self.workflow_state.parse().ok()
    }

    pub fn doc_status(&self) -> Option<DocStatus> {
        DocStatus::from_flag(self.docstatus)
    }
}
