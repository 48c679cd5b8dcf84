use crate::auth::auth::AuthUser;
use crate::leave_rules::{month_end, month_start};
use crate::model::employee::EmployeePay;
use crate::model::salary_slip::SalarySlip;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::collections::{HashMap, HashSet};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct GenerateSlips {
    #[schema(example = 2025)]
    pub year: i32,
    #[schema(example = 6)]
    pub month: u32,
    /// Restrict generation to these employees; all when omitted.
    pub employee_ids: Option<Vec<u64>>,
}

#[derive(Serialize, ToSchema)]
pub struct GenerateSummary {
    pub created: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct SlipQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub employee_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct SlipListResponse {
    pub data: Vec<SalarySlip>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(sqlx::FromRow)]
struct DayRecord {
    attendance_date: NaiveDate,
    status: String,
    leave_type: Option<String>,
}

struct MonthTally {
    present: f64,
    paid_leave: f64,
    leave: f64,
}

/// Walks the month against attendance and holidays. Holidays count as
/// present; a leave day only counts paid when an approved leave
/// application covers it.
async fn tally_month(
    pool: &MySqlPool,
    employee_id: u64,
    start: NaiveDate,
    end: NaiveDate,
    holidays: &HashSet<NaiveDate>,
) -> Result<MonthTally, sqlx::Error> {
    let records = sqlx::query_as::<_, DayRecord>(
        r#"
        SELECT attendance_date, status, leave_type
        FROM attendance
        WHERE employee_id = ? AND attendance_date BETWEEN ? AND ?
        "#,
    )
    .bind(employee_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    let by_date: HashMap<NaiveDate, DayRecord> = records
        .into_iter()
        .map(|r| (r.attendance_date, r))
        .collect();

    let mut tally = MonthTally { present: 0.0, paid_leave: 0.0, leave: 0.0 };

    let mut day = start;
    while day <= end {
        if holidays.contains(&day) {
            tally.present += 1.0;
        } else if let Some(record) = by_date.get(&day) {
            match record.status.as_str() {
                "Present" => tally.present += 1.0,
                "Half Day" => {
                    tally.leave += 0.5;
                    if record.leave_type.as_deref() == Some("Unpaid Leave") {
                        // unpaid half
                    } else {
                        tally.present += 0.5;
                        tally.paid_leave += 0.5;
                    }
                }
                "On Leave" | "Leave" => {
                    tally.leave += 1.0;
                    let covered = match record.leave_type.as_deref() {
                        Some(leave_type) if leave_type != "Unpaid Leave" => {
                            approved_leave_covers(pool, employee_id, leave_type, day).await?
                        }
                        _ => false,
                    };
                    if covered {
                        tally.present += 1.0;
                        tally.paid_leave += 1.0;
                    }
                }
                // Absent and anything unknown
                _ => tally.leave += 1.0,
            }
        } else {
            // no record on a working day
            tally.leave += 1.0;
        }

        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }

    Ok(tally)
}

async fn approved_leave_covers(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type: &str,
    day: NaiveDate,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leave_applications
            WHERE employee_id = ? AND leave_type = ? AND workflow_state = 'Approved'
              AND from_date <= ? AND to_date >= ?
        )
        "#,
    )
    .bind(employee_id)
    .bind(leave_type)
    .bind(day)
    .bind(day)
    .fetch_one(pool)
    .await
}

/* =========================
Generate monthly salary slips
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/payroll/generate",
    request_body = GenerateSlips,
    responses(
        (status = 200, description = "Generation summary", body = GenerateSummary),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn generate_slips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<GenerateSlips>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let window = month_start(payload.year, payload.month).zip(month_end(payload.year, payload.month));
    let Some((start, end)) = window else {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": "Invalid year/month" })));
    };

    // non-working holidays of the month
    let holiday_rows = sqlx::query_scalar::<_, NaiveDate>(
        "SELECT holiday_date FROM holidays WHERE holiday_date BETWEEN ? AND ? AND is_working_day = 0",
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch holidays for payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;
    let holidays: HashSet<NaiveDate> = holiday_rows.into_iter().collect();

    let employees = sqlx::query_as::<_, EmployeePay>(
        r#"
        SELECT id, employee_code, employee_name,
               basic_pay, hra, other_allowances, pf, professional_tax
        FROM employees
        WHERE status = 'Active'
        "#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch employees for payroll");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let selected: Option<HashSet<u64>> =
        payload.employee_ids.as_ref().map(|ids| ids.iter().copied().collect());

    let working_days = (end - start).num_days() as f64 + 1.0;
    let mut created = 0u32;
    let mut skipped = 0u32;
    let mut errors: Vec<String> = Vec::new();

    for emp in &employees {
        if let Some(selected) = &selected {
            if !selected.contains(&emp.id) {
                continue;
            }
        }

        match generate_one(pool.get_ref(), emp, start, end, working_days, &holidays).await {
            Ok(true) => created += 1,
            Ok(false) => skipped += 1,
            Err(e) => errors.push(format!("{} - {}", emp.employee_code, e)),
        }
    }

    tracing::info!(created, skipped, errors = errors.len(), "Salary slip generation finished");

    Ok(HttpResponse::Ok().json(GenerateSummary { created, skipped, errors }))
}

async fn generate_one(
    pool: &MySqlPool,
    emp: &EmployeePay,
    start: NaiveDate,
    end: NaiveDate,
    working_days: f64,
    holidays: &HashSet<NaiveDate>,
) -> Result<bool, sqlx::Error> {
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM salary_slips
            WHERE employee_id = ? AND pay_period_start = ? AND pay_period_end = ?
        )
        "#,
    )
    .bind(emp.id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    if exists {
        return Ok(false);
    }

    let tally = tally_month(pool, emp.id, start, end, holidays).await?;

    let gross = emp.basic_pay + emp.hra + emp.other_allowances;
    let base_deductions = emp.pf + emp.professional_tax;
    let lop_days = (tally.leave - tally.paid_leave).max(0.0);

    let prorated_gross = if working_days > 0.0 {
        gross * ((working_days - lop_days) / working_days)
    } else {
        gross
    };
    let lop_amount = if working_days > 0.0 {
        gross * (lop_days / working_days)
    } else {
        0.0
    };

    sqlx::query(
        r#"
        INSERT INTO salary_slips
            (employee_id, pay_period_start, pay_period_end, total_working_days,
             leave_days, paid_leave_days, lop_days, gross_pay, lop_amount,
             total_deductions, net_pay, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'Draft')
        "#,
    )
    .bind(emp.id)
    .bind(start)
    .bind(end)
    .bind(working_days)
    .bind(tally.leave)
    .bind(tally.paid_leave)
    .bind(lop_days)
    .bind(gross)
    .bind(lop_amount)
    .bind(base_deductions + lop_amount)
    .bind(prorated_gross - base_deductions)
    .execute(pool)
    .await?;

    Ok(true)
}

/* =========================
List slips
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/payroll",
    params(SlipQuery),
    responses(
        (status = 200, description = "Paginated salary slip list", body = SlipListResponse),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Payroll"
)]
pub async fn list_slips(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<SlipQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(10).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (where_clause, bind_employee) = match query.employee_id {
        Some(_) => (" WHERE employee_id = ?", true),
        None => ("", false),
    };

    let count_sql = format!("SELECT COUNT(*) FROM salary_slips{}", where_clause);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if bind_employee {
        count_q = count_q.bind(query.employee_id.unwrap_or_default());
    }
    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count salary slips");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, pay_period_start, pay_period_end, total_working_days,
               leave_days, paid_leave_days, lop_days, gross_pay, lop_amount,
               total_deductions, net_pay, status
        FROM salary_slips{}
        ORDER BY pay_period_start DESC
        LIMIT ? OFFSET ?
        "#,
        where_clause
    );
    let mut data_q = sqlx::query_as::<_, SalarySlip>(&data_sql);
    if bind_employee {
        data_q = data_q.bind(query.employee_id.unwrap_or_default());
    }

    let data = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch salary slips");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(SlipListResponse {
        data,
        page,
        per_page,
        total,
    }))
}
