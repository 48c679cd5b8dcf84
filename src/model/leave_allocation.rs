use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Monthly allocation of one leave type to one employee. Days for normal
/// leave types, minutes for Permission.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveAllocation {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "Paid Leave")]
    pub leave_type: String,
    #[schema(value_type = String, format = "date")]
    pub from_date: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub to_date: NaiveDate,
    #[schema(example = 1.0)]
    pub total_leaves_allocated: f64,
    #[schema(example = 0.0)]
    pub total_leaves_taken: f64,
    #[schema(example = "Approved")]
    pub status: String,
}
