use crate::auth::auth::AuthUser;
use crate::leave_rules::{
    PAID_LEAVE, carry_forward, in_probation_at_month_start, is_reset_month, month_end, month_start,
    proposed_allocations,
};
use crate::model::leave_allocation::LeaveAllocation;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AllocationMonth {
    #[param(example = 2025)]
    pub year: i32,
    #[param(example = 6)]
    pub month: u32,
}

#[derive(Serialize, ToSchema)]
pub struct ProposedAllocation {
    #[schema(example = "Paid Leave")]
    pub leave_type: String,
    /// Days, or minutes for Permission.
    #[schema(example = 1.0)]
    pub count: f64,
    /// True when an approved allocation for this month already exists.
    pub exists: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AllocationPreviewRow {
    pub employee_id: u64,
    #[schema(example = "EMP-001")]
    pub employee_code: String,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(value_type = String, format = "date", nullable = true)]
    pub date_of_joining: Option<NaiveDate>,
    pub in_probation: bool,
    pub allocations: Vec<ProposedAllocation>,
}

#[derive(Serialize, ToSchema)]
pub struct AllocationSummary {
    pub created: u32,
    pub skipped: u32,
    pub errors: Vec<String>,
    #[schema(example = "Leave allocation done. Created: 12, Skipped: 3")]
    pub message: String,
}

#[derive(Deserialize, IntoParams)]
pub struct AllocationQuery {
    pub employee_id: Option<u64>,
    #[param(example = "Paid Leave")]
    pub leave_type: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct AllocationListResponse {
    pub data: Vec<LeaveAllocation>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(sqlx::FromRow)]
struct EmployeeLite {
    id: u64,
    employee_code: String,
    employee_name: String,
    date_of_joining: Option<NaiveDate>,
    skip_probation: bool,
}

async fn active_employees(pool: &MySqlPool) -> Result<Vec<EmployeeLite>, sqlx::Error> {
    sqlx::query_as::<_, EmployeeLite>(
        r#"
        SELECT id, employee_code, employee_name, date_of_joining, skip_probation
        FROM employees
        WHERE status = 'Active'
        ORDER BY employee_code
        "#,
    )
    .fetch_all(pool)
    .await
}

async fn allocation_exists(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type: &str,
    from_date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leave_allocations
            WHERE employee_id = ? AND leave_type = ? AND from_date = ? AND status = 'Approved'
        )
        "#,
    )
    .bind(employee_id)
    .bind(leave_type)
    .bind(from_date)
    .fetch_one(pool)
    .await
}

/* =========================
Preview (read-only)
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave-allocations/preview",
    params(AllocationMonth),
    responses(
        (status = 200, description = "Proposed allocations per employee", body = [AllocationPreviewRow]),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Allocation"
)]
pub async fn allocation_preview(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AllocationMonth>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let Some(window_start) = month_start(query.year, query.month) else {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": "Invalid year/month" })));
    };

    let employees = active_employees(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch employees for allocation preview");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let mut preview = Vec::with_capacity(employees.len());

    for emp in employees {
        let in_probation =
            in_probation_at_month_start(emp.date_of_joining, emp.skip_probation, window_start);

        let mut allocations = Vec::new();
        for (leave_type, count) in proposed_allocations(in_probation) {
            let exists = allocation_exists(pool.get_ref(), emp.id, leave_type, window_start)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, employee_id = emp.id, leave_type,
                        "Allocation existence check failed");
                    actix_web::error::ErrorInternalServerError("Internal Server Error")
                })?;

            allocations.push(ProposedAllocation {
                leave_type: leave_type.to_owned(),
                count,
                exists,
            });
        }

        preview.push(AllocationPreviewRow {
            employee_id: emp.id,
            employee_code: emp.employee_code,
            employee_name: emp.employee_name,
            date_of_joining: emp.date_of_joining,
            in_probation,
            allocations,
        });
    }

    Ok(HttpResponse::Ok().json(preview))
}

/* =========================
Auto allocate (mutating, confirmed client-side)
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave-allocations/auto-allocate",
    request_body = AllocationMonth,
    responses(
        (status = 200, description = "Allocation summary", body = AllocationSummary),
        (status = 400, description = "Invalid month"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Allocation"
)]
pub async fn auto_allocate(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<AllocationMonth>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let window = month_start(payload.year, payload.month).zip(month_end(payload.year, payload.month));
    let Some((window_start, window_end)) = window else {
        return Ok(HttpResponse::BadRequest().json(json!({ "message": "Invalid year/month" })));
    };

    // previous month window, for the Paid Leave carry-forward
    let (prev_year, prev_month) = if payload.month == 1 {
        (payload.year - 1, 12)
    } else {
        (payload.year, payload.month - 1)
    };
    let prev_start = month_start(prev_year, prev_month);
    let prev_end = month_end(prev_year, prev_month);

    let employees = active_employees(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch employees for auto allocation");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let mut created = 0u32;
    let mut skipped = 0u32;
    let mut errors: Vec<String> = Vec::new();

    for emp in &employees {
        let in_probation =
            in_probation_at_month_start(emp.date_of_joining, emp.skip_probation, window_start);

        for (leave_type, base_count) in proposed_allocations(in_probation) {
            match allocate_one(
                pool.get_ref(),
                emp.id,
                leave_type,
                base_count,
                window_start,
                window_end,
                prev_start.zip(prev_end),
                payload.month,
            )
            .await
            {
                Ok(true) => created += 1,
                Ok(false) => skipped += 1,
                Err(e) => errors.push(format!("{} - {} - {}", emp.employee_code, leave_type, e)),
            }
        }
    }

    let mut message = format!("Leave allocation done. Created: {}, Skipped: {}", created, skipped);
    if !errors.is_empty() {
        message.push_str(&format!(", Errors: {}", errors.len()));
    }

    tracing::info!(created, skipped, errors = errors.len(), "Auto allocation finished");

    Ok(HttpResponse::Ok().json(AllocationSummary {
        created,
        skipped,
        errors,
        message,
    }))
}

/* =========================
List allocations (HR)
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave-allocations",
    params(AllocationQuery),
    responses(
        (status = 200, description = "Paginated allocation list", body = AllocationListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave Allocation"
)]
pub async fn list_allocations(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AllocationQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut employee_bind = None;
    let mut leave_type_bind = None;

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        employee_bind = Some(emp_id);
    }
    if let Some(leave_type) = query.leave_type.as_deref() {
        where_sql.push_str(" AND leave_type = ?");
        leave_type_bind = Some(leave_type);
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_allocations{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(emp_id) = employee_bind {
        count_q = count_q.bind(emp_id);
    }
    if let Some(leave_type) = leave_type_bind {
        count_q = count_q.bind(leave_type);
    }
    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count leave allocations");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, leave_type, from_date, to_date,
               total_leaves_allocated, total_leaves_taken, status
        FROM leave_allocations{}
        ORDER BY from_date DESC, employee_id
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );
    let mut data_q = sqlx::query_as::<_, LeaveAllocation>(&data_sql);
    if let Some(emp_id) = employee_bind {
        data_q = data_q.bind(emp_id);
    }
    if let Some(leave_type) = leave_type_bind {
        data_q = data_q.bind(leave_type);
    }

    let data = data_q
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch leave allocations");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(AllocationListResponse {
        data,
        page,
        per_page,
        total,
    }))
}

/// Creates one allocation unless it already exists. Returns Ok(true) when
/// a row was created, Ok(false) when skipped.
#[allow(clippy::too_many_arguments)]
async fn allocate_one(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type: &str,
    base_count: f64,
    window_start: NaiveDate,
    window_end: NaiveDate,
    prev_window: Option<(NaiveDate, NaiveDate)>,
    month: u32,
) -> Result<bool, sqlx::Error> {
    // idempotence: a second sweep over the same month creates nothing
    let exists = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM leave_allocations
            WHERE employee_id = ? AND leave_type = ?
              AND from_date = ? AND to_date = ? AND status = 'Approved'
        )
        "#,
    )
    .bind(employee_id)
    .bind(leave_type)
    .bind(window_start)
    .bind(window_end)
    .fetch_one(pool)
    .await?;

    if exists {
        return Ok(false);
    }

    // Paid Leave carries unused balance forward within a reset period
    let mut carried = 0.0;
    if leave_type == PAID_LEAVE && !is_reset_month(month) {
        if let Some((prev_start, prev_end)) = prev_window {
            let prev = sqlx::query_as::<_, (f64, f64)>(
                r#"
                SELECT total_leaves_allocated, total_leaves_taken
                FROM leave_allocations
                WHERE employee_id = ? AND leave_type = ?
                  AND from_date = ? AND to_date = ? AND status = 'Approved'
                "#,
            )
            .bind(employee_id)
            .bind(leave_type)
            .bind(prev_start)
            .bind(prev_end)
            .fetch_optional(pool)
            .await?;

            if let Some((allocated, taken)) = prev {
                carried = carry_forward(allocated, taken);
            }
        }
    }

    sqlx::query(
        r#"
        INSERT INTO leave_allocations
            (employee_id, leave_type, from_date, to_date,
             total_leaves_allocated, total_leaves_taken, status)
        VALUES (?, ?, ?, ?, ?, 0, 'Approved')
        "#,
    )
    .bind(employee_id)
    .bind(leave_type)
    .bind(window_start)
    .bind(window_end)
    .bind(base_count + carried)
    .execute(pool)
    .await?;

    Ok(true)
}
