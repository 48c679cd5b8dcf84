use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, sqlx::FromRow, ToSchema)]
pub struct SalarySlip {
    pub id: u64,
    pub employee_id: u64,
    #[schema(value_type = String, format = "date")]
    pub pay_period_start: NaiveDate,
    #[schema(value_type = String, format = "date")]
    pub pay_period_end: NaiveDate,
    pub total_working_days: f64,
    pub leave_days: f64,
    pub paid_leave_days: f64,
    pub lop_days: f64,
    pub gross_pay: f64,
    pub lop_amount: f64,
    pub total_deductions: f64,
    pub net_pay: f64,
    #[schema(example = "Draft")]
    pub status: String,
}
