use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP-001",
        "employee_name": "John Doe",
        "email": "john.doe@company.com",
        "personal_email": "john@gmail.com",
        "date_of_joining": "2024-01-01",
        "skip_probation": false,
        "status": "Active"
    })
)]
pub struct Employee {
    #[schema(example = 1)]
    pub id: u64,

    #[schema(example = "EMP-001")]
    pub employee_code: String,

    #[schema(example = "John Doe")]
    pub employee_name: String,

    #[schema(example = "john.doe@company.com", nullable = true)]
    pub email: Option<String>,

    #[schema(example = "john@gmail.com", nullable = true)]
    pub personal_email: Option<String>,

    #[schema(example = "2024-01-01", value_type = String, format = "date", nullable = true)]
    pub date_of_joining: Option<NaiveDate>,

    /// Exempts the employee from the probation leave restrictions.
    pub skip_probation: bool,

    #[schema(example = "Active")]
    pub status: String,
}

/// Compensation columns read by salary slip generation; kept separate so
/// the common listings do not drag pay data around.
#[derive(Debug, sqlx::FromRow)]
pub struct EmployeePay {
    pub id: u64,
    pub employee_code: String,
    pub employee_name: String,
    pub basic_pay: f64,
    pub hra: f64,
    pub other_allowances: f64,
    pub pf: f64,
    pub professional_tax: f64,
}
