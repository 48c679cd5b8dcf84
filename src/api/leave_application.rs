use crate::auth::auth::AuthUser;
use crate::leave_rules::{
    self, BalanceCheck, LeaveRuleError, ProbationInfo, check_balance, probation_info,
    requested_amount, total_days,
};
use crate::model::leave_application::LeaveApplication;
use crate::workflow::clarification::{
    ClarificationButton, ClarificationError, ClarificationRound, ClarificationThread,
    ensure_can_ask, ensure_can_reply, leave_fields_editable, prune_action_menu, visible_actions,
};
use crate::workflow::{WorkflowAction, WorkflowState, next_state};
use actix_web::{HttpResponse, Responder, web};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "Paid Leave")]
    pub leave_type: String,
    #[schema(example = "2026-01-10", format = "date", value_type = String)]
    pub from_date: NaiveDate,
    #[schema(example = "2026-01-12", format = "date", value_type = String)]
    pub to_date: NaiveDate,
    #[serde(default)]
    pub half_day: bool,
    /// Minutes; required for the Permission leave type.
    pub permission_minutes: Option<f64>,
    pub reason: Option<String>,
    pub attachment: Option<String>,
}

/// Partial edit of the leave-content fields, allowed only inside the
/// clarification editability window.
#[derive(Deserialize, ToSchema)]
pub struct UpdateLeave {
    pub leave_type: Option<String>,
    #[schema(format = "date", value_type = Option<String>)]
    pub from_date: Option<NaiveDate>,
    #[schema(format = "date", value_type = Option<String>)]
    pub to_date: Option<NaiveDate>,
    pub half_day: Option<bool>,
    pub permission_minutes: Option<f64>,
    pub reason: Option<String>,
    pub attachment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AskClarificationReq {
    #[schema(example = "Please attach the medical certificate.")]
    pub query: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReplyReq {
    #[schema(example = "Certificate attached now.")]
    pub reply: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveDetailResponse {
    pub record: LeaveApplication,
    /// Full question/answer history, oldest round first.
    pub rounds: Vec<ClarificationRound>,
    /// Buttons offered to the acting user in the current state.
    pub actions: Vec<ClarificationButton>,
    /// Generic workflow menu with the duplicated entries suppressed;
    /// None means the menu is hidden entirely.
    pub menu_actions: Option<Vec<String>>,
    /// Whether the leave-content fields are editable for the acting user.
    pub fields_editable: bool,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID
    pub employee_id: Option<u64>,
    /// Filter by workflow state
    #[param(example = "Pending")]
    pub workflow_state: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u64>,
    /// Pagination per page number
    pub per_page: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveApplication>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct BalanceQuery {
    pub employee_id: u64,
    #[param(example = "Paid Leave")]
    pub leave_type: String,
    #[param(value_type = String)]
    pub from_date: NaiveDate,
    #[param(value_type = String)]
    pub to_date: NaiveDate,
    pub half_day: Option<bool>,
    pub permission_minutes: Option<f64>,
}

#[derive(Deserialize, IntoParams)]
pub struct ProbationQuery {
    pub employee_id: u64,
    /// Defaults to today.
    #[param(value_type = Option<String>)]
    pub date: Option<NaiveDate>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

fn rule_error_response(err: &LeaveRuleError) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "message": err.to_string() }))
}

fn clarification_error_response(err: &ClarificationError) -> HttpResponse {
    match err {
        ClarificationError::NotPermitted { .. } => {
            HttpResponse::Forbidden().json(json!({ "message": err.to_string() }))
        }
        ClarificationError::CorruptThread => {
            HttpResponse::InternalServerError().json(json!({ "message": err.to_string() }))
        }
        _ => HttpResponse::BadRequest().json(json!({ "message": err.to_string() })),
    }
}

async fn load_record(
    pool: &MySqlPool,
    leave_id: u64,
) -> Result<Option<LeaveApplication>, sqlx::Error> {
    sqlx::query_as::<_, LeaveApplication>(
        r#"
        SELECT id, employee_id, leave_type, from_date, to_date, half_day,
               permission_minutes, total_days, reason, attachment,
               workflow_state, docstatus, created_at
        FROM leave_applications
        WHERE id = ?
        "#,
    )
    .bind(leave_id)
    .fetch_optional(pool)
    .await
}

async fn load_rounds(
    pool: &MySqlPool,
    leave_id: u64,
) -> Result<Vec<ClarificationRound>, sqlx::Error> {
    sqlx::query_as::<_, ClarificationRound>(
        r#"
        SELECT round_no, hr_query, employee_reply
        FROM leave_clarification_rounds
        WHERE leave_application_id = ?
        ORDER BY round_no
        "#,
    )
    .bind(leave_id)
    .fetch_all(pool)
    .await
}

/// Remaining balance over the approved allocations overlapping the range.
async fn remaining_balance(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type: &str,
    from_date: NaiveDate,
    to_date: NaiveDate,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(total_leaves_allocated - total_leaves_taken), 0)
        FROM leave_allocations
        WHERE employee_id = ?
          AND leave_type = ?
          AND status = 'Approved'
          AND from_date <= ?
          AND to_date >= ?
        "#,
    )
    .bind(employee_id)
    .bind(leave_type)
    .bind(to_date)
    .bind(from_date)
    .fetch_one(pool)
    .await
}

async fn fetch_probation(
    pool: &MySqlPool,
    employee_id: u64,
    as_of: NaiveDate,
) -> Result<Option<ProbationInfo>, sqlx::Error> {
    let employee = sqlx::query_as::<_, (Option<NaiveDate>, bool)>(
        "SELECT date_of_joining, skip_probation FROM employees WHERE id = ?",
    )
    .bind(employee_id)
    .fetch_optional(pool)
    .await?;

    Ok(employee.map(|(joined, skip)| probation_info(joined, skip, as_of)))
}

/// Moves the record from `from` via `action`. The guarded UPDATE makes the
/// transition a no-op when someone else already moved the record on.
async fn apply_workflow_transition(
    pool: &MySqlPool,
    leave_id: u64,
    from: WorkflowState,
    action: WorkflowAction,
) -> Result<Option<WorkflowState>, sqlx::Error> {
    let Some(to) = next_state(from, action) else {
        return Ok(None);
    };

    let result = sqlx::query(
        "UPDATE leave_applications SET workflow_state = ? WHERE id = ? AND workflow_state = ?",
    )
    .bind(to.to_string())
    .bind(leave_id)
    .bind(from.to_string())
    .execute(pool)
    .await?;

    Ok(if result.rows_affected() == 1 { Some(to) } else { None })
}

/* =========================
Create leave application
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body = CreateLeave,
    responses(
        (status = 200, description = "Leave application submitted", body = Object, example = json!({
            "message": "Leave application submitted",
            "workflow_state": "Pending",
            "total_days": 3.0
        })),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    let employee_id = auth.require_employee_profile()?;

    // 1) date window + total days
    let total = match total_days(payload.from_date, payload.to_date, payload.half_day) {
        Ok(t) => t,
        Err(e) => return Ok(rule_error_response(&e)),
    };

    // 2) probation gate on the leave type
    let probation = fetch_probation(pool.get_ref(), employee_id, payload.from_date)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Failed to fetch probation info");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .unwrap_or(ProbationInfo { in_probation: false, probation_end_date: None });

    if let Err(e) = leave_rules::ensure_leave_type_allowed(&payload.leave_type, &probation) {
        return Ok(rule_error_response(&e));
    }

    // 3) balance
    let remaining = remaining_balance(
        pool.get_ref(),
        employee_id,
        &payload.leave_type,
        payload.from_date,
        payload.to_date,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to read leave balance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let balance = match check_balance(
        remaining,
        &payload.leave_type,
        payload.from_date,
        payload.to_date,
        payload.half_day,
        payload.permission_minutes,
    ) {
        Ok(b) => b,
        Err(e) => return Ok(rule_error_response(&e)),
    };

    if !balance.allowed {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": format!(
                "Not enough leave balance. Available: {} {}, Requested: {} {}",
                balance.remaining, balance.unit, balance.requested, balance.unit
            ),
            "total_days": 0.0,
            "balance": balance
        })));
    }

    // 4) overlap / duplicate guards
    if !leave_rules::is_permission(&payload.leave_type) {
        let overlapping = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM leave_applications
                WHERE employee_id = ? AND workflow_state = 'Approved' AND docstatus = 1
                  AND from_date <= ? AND to_date >= ?
            )
            "#,
        )
        .bind(employee_id)
        .bind(payload.to_date)
        .bind(payload.from_date)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Overlap check failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

        if overlapping {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "An approved leave already exists in the selected date range"
            })));
        }
    } else {
        let duplicate = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM leave_applications
                WHERE employee_id = ? AND leave_type = 'Permission' AND from_date = ?
                  AND workflow_state IN ('Approved', 'Pending')
            )
            "#,
        )
        .bind(employee_id)
        .bind(payload.from_date)
        .fetch_one(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id, "Duplicate permission check failed");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

        if duplicate {
            return Ok(HttpResponse::BadRequest().json(json!({
                "message": "A Permission request already exists for that date"
            })));
        }
    }

    // 5) insert submitted, workflow starts at Pending
    sqlx::query(
        r#"
        INSERT INTO leave_applications
            (employee_id, leave_type, from_date, to_date, half_day,
             permission_minutes, total_days, reason, attachment,
             workflow_state, docstatus)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'Pending', 1)
        "#,
    )
    .bind(employee_id)
    .bind(&payload.leave_type)
    .bind(payload.from_date)
    .bind(payload.to_date)
    .bind(payload.half_day)
    .bind(payload.permission_minutes)
    .bind(total)
    .bind(&payload.reason)
    .bind(&payload.attachment)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id, "Failed to create leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave application submitted",
        "workflow_state": WorkflowState::Pending,
        "total_days": total
    })))
}

/* =========================
Detail with clarification thread
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave application ID")),
    responses(
        (status = 200, description = "Leave application found", body = LeaveDetailResponse),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let record = load_record(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(record) = record else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Leave application not found"
        })));
    };

    // employees only see their own applications
    if !auth.role.has_hr_capability() && auth.employee_id != Some(record.employee_id) {
        return Err(actix_web::error::ErrorForbidden("Not your application"));
    }

    let rounds = load_rounds(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch clarification rounds");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let state = record.state();
    let doc_status = record.doc_status();
    let (actions, fields_editable) = match (state, doc_status) {
        (Some(state), Some(doc_status)) => (
            visible_actions(state, auth.role),
            leave_fields_editable(doc_status, state, auth.role),
        ),
        // unknown label from an older revision: offer nothing
        _ => (Vec::new(), false),
    };

    // the generic menu minus the entries the dedicated buttons replace
    let menu_actions = state.and_then(|state| {
        let entries = [
            WorkflowAction::AskClarification,
            WorkflowAction::Reply,
            WorkflowAction::Approve,
            WorkflowAction::Reject,
        ]
        .into_iter()
        .filter(|action| next_state(state, *action).is_some())
        .map(|action| action.to_string())
        .collect();
        prune_action_menu(entries)
    });

    Ok(HttpResponse::Ok().json(LeaveDetailResponse {
        record,
        rounds,
        actions,
        menu_actions,
        fields_editable,
    }))
}

/* =========================
Edit during clarification
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "Leave application ID")),
    request_body = UpdateLeave,
    responses(
        (status = 200, description = "Leave application updated", body = Object, example = json!({
            "message": "Leave application updated",
            "total_days": 2.5
        })),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Fields are not editable in the current state"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let record = load_record(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(record) = record else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Leave application not found"
        })));
    };

    if auth.employee_id != Some(record.employee_id) {
        return Err(actix_web::error::ErrorForbidden("Not your application"));
    }

    let editable = match (record.state(), record.doc_status()) {
        (Some(state), Some(doc_status)) => leave_fields_editable(doc_status, state, auth.role),
        _ => false,
    };
    if !editable {
        return Err(actix_web::error::ErrorForbidden(
            "Fields are not editable in the current state",
        ));
    }

    // merge the payload onto the stored record, then re-run the same
    // validations a fresh submission goes through
    let leave_type = payload.leave_type.clone().unwrap_or(record.leave_type);
    let from_date = payload.from_date.unwrap_or(record.from_date);
    let to_date = payload.to_date.unwrap_or(record.to_date);
    let half_day = payload.half_day.unwrap_or(record.half_day);
    let permission_minutes = payload.permission_minutes.or(record.permission_minutes);
    let reason = payload.reason.clone().or(record.reason);
    let attachment = payload.attachment.clone().or(record.attachment);

    let total = match total_days(from_date, to_date, half_day) {
        Ok(t) => t,
        Err(e) => return Ok(rule_error_response(&e)),
    };

    let probation = fetch_probation(pool.get_ref(), record.employee_id, from_date)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = record.employee_id, "Failed to fetch probation info");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?
        .unwrap_or(ProbationInfo { in_probation: false, probation_end_date: None });

    if let Err(e) = leave_rules::ensure_leave_type_allowed(&leave_type, &probation) {
        return Ok(rule_error_response(&e));
    }

    if leave_rules::is_permission(&leave_type) {
        if let Err(e) = requested_amount(&leave_type, from_date, to_date, half_day, permission_minutes)
        {
            return Ok(rule_error_response(&e));
        }
    }

    sqlx::query(
        r#"
        UPDATE leave_applications
        SET leave_type = ?, from_date = ?, to_date = ?, half_day = ?,
            permission_minutes = ?, total_days = ?, reason = ?, attachment = ?
        WHERE id = ?
        "#,
    )
    .bind(&leave_type)
    .bind(from_date)
    .bind(to_date)
    .bind(half_day)
    .bind(permission_minutes)
    .bind(total)
    .bind(&reason)
    .bind(&attachment)
    .bind(leave_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to update leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave application updated",
        "total_days": total
    })))
}

/* =========================
HR asks a clarification
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave/{leave_id}/ask-clarification",
    params(("leave_id" = u64, Path, description = "Leave application ID")),
    request_body = AskClarificationReq,
    responses(
        (status = 200, description = "Clarification recorded", body = Object, example = json!({
            "message": "Clarification sent to employee",
            "round": 1,
            "workflow_state": "Clarification Requested"
        })),
        (status = 400, description = "No rounds left or wrong state"),
        (status = 403, description = "HR only"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Clarification"
)]
pub async fn ask_clarification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<AskClarificationReq>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let query = payload.query.trim();

    if query.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "HR Question is required"
        })));
    }

    let record = load_record(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(record) = record else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Leave application not found"
        })));
    };

    let Some(state) = record.state() else {
        return Err(actix_web::error::ErrorInternalServerError("Unknown workflow state"));
    };

    if let Err(e) = ensure_can_ask(state, auth.role) {
        return Ok(clarification_error_response(&e));
    }

    let rounds = load_rounds(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch clarification rounds");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let thread = match ClarificationThread::from_rows(rounds) {
        Ok(t) => t,
        Err(e) => return Ok(clarification_error_response(&e)),
    };
    let round_no = match thread.next_question_round() {
        Ok(n) => n,
        Err(e) => return Ok(clarification_error_response(&e)),
    };

    // persist the question first; the transition below must not be able to
    // lose the text
    sqlx::query(
        r#"
        INSERT INTO leave_clarification_rounds
            (leave_application_id, round_no, hr_query, asked_by)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(leave_id)
    .bind(round_no)
    .bind(query)
    .bind(&auth.username)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, round_no, "Failed to store HR query");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match apply_workflow_transition(pool.get_ref(), leave_id, state, WorkflowAction::AskClarification)
        .await
    {
        Ok(Some(new_state)) => Ok(HttpResponse::Ok().json(json!({
            "message": "Clarification sent to employee",
            "round": round_no,
            "workflow_state": new_state
        }))),
        Ok(None) => Ok(HttpResponse::Conflict().json(json!({
            "message": "The application moved to another state; the question was saved"
        }))),
        Err(e) => {
            // the round row is already committed; state stays Pending
            tracing::warn!(error = %e, leave_id, round_no,
                "Clarification saved but workflow transition failed");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Clarification was saved but the workflow transition failed; \
                            the application state is unchanged"
            })))
        }
    }
}

/* =========================
Employee replies
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave/{leave_id}/reply",
    params(("leave_id" = u64, Path, description = "Leave application ID")),
    request_body = ReplyReq,
    responses(
        (status = 200, description = "Reply recorded", body = Object, example = json!({
            "message": "Reply sent to HR",
            "round": 1,
            "workflow_state": "Pending"
        })),
        (status = 400, description = "No pending query or wrong state"),
        (status = 403, description = "Employee only"),
        (status = 404, description = "Leave application not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Clarification"
)]
pub async fn reply_clarification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<ReplyReq>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let reply = payload.reply.trim();

    if reply.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Your Reply is required"
        })));
    }

    let record = load_record(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(record) = record else {
        return Ok(HttpResponse::NotFound().json(json!({
            "message": "Leave application not found"
        })));
    };

    if auth.employee_id != Some(record.employee_id) {
        return Err(actix_web::error::ErrorForbidden("Not your application"));
    }

    let Some(state) = record.state() else {
        return Err(actix_web::error::ErrorInternalServerError("Unknown workflow state"));
    };

    if let Err(e) = ensure_can_reply(state, auth.role) {
        return Ok(clarification_error_response(&e));
    }

    let rounds = load_rounds(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch clarification rounds");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let thread = match ClarificationThread::from_rows(rounds) {
        Ok(t) => t,
        Err(e) => return Ok(clarification_error_response(&e)),
    };
    let round_no = match thread.next_pending_reply() {
        Ok(n) => n,
        Err(e) => return Ok(clarification_error_response(&e)),
    };

    sqlx::query(
        r#"
        UPDATE leave_clarification_rounds
        SET employee_reply = ?
        WHERE leave_application_id = ? AND round_no = ? AND employee_reply IS NULL
        "#,
    )
    .bind(reply)
    .bind(leave_id)
    .bind(round_no)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, round_no, "Failed to store employee reply");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match apply_workflow_transition(pool.get_ref(), leave_id, state, WorkflowAction::Reply).await {
        Ok(Some(new_state)) => Ok(HttpResponse::Ok().json(json!({
            "message": "Reply sent to HR",
            "round": round_no,
            "workflow_state": new_state
        }))),
        Ok(None) => Ok(HttpResponse::Conflict().json(json!({
            "message": "The application moved to another state; the reply was saved"
        }))),
        Err(e) => {
            tracing::warn!(error = %e, leave_id, round_no,
                "Reply saved but workflow transition failed");
            Ok(HttpResponse::InternalServerError().json(json!({
                "message": "Reply was saved but the workflow transition failed; \
                            the application state is unchanged"
            })))
        }
    }
}

/* =========================
Approve / reject (HR)
========================= */
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "Leave application ID")),
    responses(
        (status = 200, description = "Leave approved"),
        (status = 400, description = "Not found or already processed"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let record = load_record(pool.get_ref(), leave_id).await.map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave application");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let Some(record) = record else {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Leave application not found or already processed"
        })));
    };

    let moved = apply_workflow_transition(
        pool.get_ref(),
        leave_id,
        WorkflowState::Pending,
        WorkflowAction::Approve,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Approve leave failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if moved.is_none() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Leave application not found or already processed"
        })));
    }

    if let Err(e) = deduct_allocations(pool.get_ref(), &record).await {
        // the approval stands; the allocation books are off until fixed
        tracing::warn!(error = %e, leave_id, "Allocation deduction failed after approval");
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave approved" })))
}

#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "Leave application ID")),
    responses(
        (status = 200, description = "Leave rejected"),
        (status = 400, description = "Not found or already processed"),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let leave_id = path.into_inner();

    let moved = apply_workflow_transition(
        pool.get_ref(),
        leave_id,
        WorkflowState::Pending,
        WorkflowAction::Reject,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Reject leave failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if moved.is_none() {
        return Ok(HttpResponse::BadRequest().json(json!({
            "message": "Leave application not found or already processed"
        })));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave rejected" })))
}

/// Books the approved amount against the overlapping-and-later approved
/// allocations, oldest first; any overflow lands on the last one.
async fn deduct_allocations(pool: &MySqlPool, record: &LeaveApplication) -> anyhow::Result<()> {
    let (amount, _unit) = requested_amount(
        &record.leave_type,
        record.from_date,
        record.to_date,
        record.half_day,
        record.permission_minutes,
    )?;

    let allocations = sqlx::query_as::<_, (u64, f64, f64)>(
        r#"
        SELECT id, total_leaves_allocated, total_leaves_taken
        FROM leave_allocations
        WHERE employee_id = ? AND leave_type = ? AND status = 'Approved'
          AND to_date >= ?
        ORDER BY from_date ASC
        "#,
    )
    .bind(record.employee_id)
    .bind(&record.leave_type)
    .bind(record.from_date)
    .fetch_all(pool)
    .await?;

    if allocations.is_empty() {
        anyhow::bail!(
            "no approved allocation for employee {} / {}",
            record.employee_id,
            record.leave_type
        );
    }

    let mut remainder = amount;
    for &(id, allocated, taken) in &allocations {
        if remainder <= 0.0 {
            break;
        }
        let available = (allocated - taken).max(0.0);
        if available <= 0.0 {
            continue;
        }
        let deduct = remainder.min(available);
        sqlx::query("UPDATE leave_allocations SET total_leaves_taken = total_leaves_taken + ? WHERE id = ?")
            .bind(deduct)
            .bind(id)
            .execute(pool)
            .await?;
        remainder -= deduct;
    }

    if remainder > 0.0 {
        // nothing left anywhere: book the overflow on the last allocation
        let (last_id, _, _) = allocations[allocations.len() - 1];
        sqlx::query("UPDATE leave_allocations SET total_leaves_taken = total_leaves_taken + ? WHERE id = ?")
            .bind(remainder)
            .bind(last_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

/* =========================
List (HR)
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE 1=1");
    let mut args: Vec<FilterValue> = Vec::new();

    if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(state) = query.workflow_state.as_deref() {
        where_sql.push_str(" AND workflow_state = ?");
        args.push(FilterValue::Str(state));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_applications{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count leave applications");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, employee_id, leave_type, from_date, to_date, half_day,
               permission_minutes, total_days, reason, attachment,
               workflow_state, docstatus, created_at
        FROM leave_applications
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveApplication>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch leave list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Balance / probation lookups
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balance check result", body = BalanceCheck),
        (status = 400, description = "Invalid request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_balance(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let remaining = remaining_balance(
        pool.get_ref(),
        query.employee_id,
        &query.leave_type,
        query.from_date,
        query.to_date,
    )
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id = query.employee_id, "Failed to read leave balance");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    match check_balance(
        remaining,
        &query.leave_type,
        query.from_date,
        query.to_date,
        query.half_day.unwrap_or(false),
        query.permission_minutes,
    ) {
        Ok(balance) => Ok(HttpResponse::Ok().json(balance)),
        Err(e) => Ok(rule_error_response(&e)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/probation",
    params(ProbationQuery),
    responses(
        (status = 200, description = "Probation status", body = ProbationInfo),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn probation_status(
    _auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ProbationQuery>,
) -> actix_web::Result<impl Responder> {
    let as_of = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let info = fetch_probation(pool.get_ref(), query.employee_id, as_of)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, employee_id = query.employee_id, "Failed to fetch probation info");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    match info {
        Some(info) => Ok(HttpResponse::Ok().json(info)),
        None => Ok(HttpResponse::NotFound().json(json!({
            "message": "Employee not found"
        }))),
    }
}
