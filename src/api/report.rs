//! Tabular reports: declarative filter sets in, `{columns, data, summary}`
//! out, ready for a generic report renderer.

use crate::auth::auth::AuthUser;
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Serialize, ToSchema)]
pub struct ReportColumn {
    pub label: &'static str,
    pub fieldname: &'static str,
    pub fieldtype: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<&'static str>,
    pub width: u32,
}

#[derive(Serialize, ToSchema)]
pub struct SummaryCard {
    pub label: &'static str,
    pub value: f64,
    pub indicator: &'static str,
    pub datatype: &'static str,
}

/* =========================
Attendance Report
========================= */

#[derive(Deserialize, IntoParams)]
pub struct AttendanceReportFilters {
    /// Defaults to the start of the current month.
    #[param(value_type = Option<String>)]
    pub from_date: Option<NaiveDate>,
    /// Defaults to the end of the current month.
    #[param(value_type = Option<String>)]
    pub to_date: Option<NaiveDate>,
    pub employee_id: Option<u64>,
    /// Present, Absent, Holiday, Missing, On Leave or Half Day.
    pub status: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceReportRow {
    #[schema(value_type = String, format = "date")]
    pub attendance_date: NaiveDate,
    pub employee_id: u64,
    pub employee_name: String,
    #[schema(example = "Present")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "time")]
    pub check_in: Option<NaiveTime>,
    #[schema(value_type = Option<String>, format = "time")]
    pub check_out: Option<NaiveTime>,
    /// Holiday description when the row is a synthesized Holiday entry.
    pub remarks: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceReport {
    pub columns: Vec<ReportColumn>,
    pub data: Vec<AttendanceReportRow>,
}

fn attendance_columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn { label: "Date", fieldname: "attendance_date", fieldtype: "Date", options: None, width: 120 },
        ReportColumn { label: "Employee", fieldname: "employee_id", fieldtype: "Link", options: Some("Employee"), width: 200 },
        ReportColumn { label: "Employee Name", fieldname: "employee_name", fieldtype: "Data", options: None, width: 200 },
        ReportColumn { label: "Status", fieldname: "status", fieldtype: "Select", options: None, width: 100 },
        ReportColumn { label: "In Time", fieldname: "check_in", fieldtype: "Time", options: None, width: 100 },
        ReportColumn { label: "Out Time", fieldname: "check_out", fieldtype: "Time", options: None, width: 100 },
        ReportColumn { label: "Remarks", fieldname: "remarks", fieldtype: "Data", options: None, width: 160 },
    ]
}

#[derive(sqlx::FromRow)]
struct AttendanceDbRow {
    employee_id: u64,
    attendance_date: NaiveDate,
    status: String,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
}

/// Gap analysis over the date range, newest day first: real attendance
/// rows where they exist, synthesized Holiday rows on non-working
/// holidays, Missing rows for past days with neither.
#[utoipa::path(
    get,
    path = "/api/v1/reports/attendance",
    params(AttendanceReportFilters),
    responses(
        (status = 200, description = "Attendance report", body = AttendanceReport),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn attendance_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceReportFilters>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let today = Utc::now().date_naive();
    let from_date = query
        .from_date
        .unwrap_or_else(|| today.with_day(1).unwrap_or(today));
    let to_date = query.to_date.unwrap_or_else(|| {
        crate::leave_rules::month_end(today.year(), today.month()).unwrap_or(today)
    });

    // 1) employees in scope
    let mut employee_sql = String::from(
        "SELECT id, employee_name, date_of_joining FROM employees WHERE status = 'Active'",
    );
    if query.employee_id.is_some() {
        employee_sql.push_str(" AND id = ?");
    }
    let mut employee_q =
        sqlx::query_as::<_, (u64, String, Option<NaiveDate>)>(&employee_sql);
    if let Some(id) = query.employee_id {
        employee_q = employee_q.bind(id);
    }
    let employees = employee_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch employees for attendance report");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if employees.is_empty() {
        return Ok(HttpResponse::Ok().json(AttendanceReport {
            columns: attendance_columns(),
            data: Vec::new(),
        }));
    }

    // 2) existing attendance, keyed by (employee, date)
    let attendance = sqlx::query_as::<_, AttendanceDbRow>(
        r#"
        SELECT employee_id, attendance_date, status, check_in, check_out
        FROM attendance
        WHERE attendance_date BETWEEN ? AND ?
        "#,
    )
    .bind(from_date)
    .bind(to_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch attendance rows");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let mut attendance_map: HashMap<(u64, NaiveDate), AttendanceDbRow> = HashMap::new();
    for row in attendance {
        attendance_map.insert((row.employee_id, row.attendance_date), row);
    }

    // 3) holidays in range
    let holidays = sqlx::query_as::<_, (NaiveDate, Option<String>, bool)>(
        r#"
        SELECT holiday_date, description, is_working_day
        FROM holidays
        WHERE holiday_date BETWEEN ? AND ?
        "#,
    )
    .bind(from_date)
    .bind(to_date)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch holidays");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let holiday_map: HashMap<NaiveDate, (Option<String>, bool)> = holidays
        .into_iter()
        .map(|(date, desc, working)| (date, (desc, working)))
        .collect();

    // 4) gap analysis, newest day first
    let mut data = Vec::new();
    let mut day = to_date;
    while day >= from_date {
        for (employee_id, employee_name, date_of_joining) in &employees {
            if matches!(date_of_joining, Some(joined) if day < *joined) {
                continue;
            }

            let row = if let Some(found) = attendance_map.get(&(*employee_id, day)) {
                Some(AttendanceReportRow {
                    attendance_date: day,
                    employee_id: *employee_id,
                    employee_name: employee_name.clone(),
                    status: found.status.clone(),
                    check_in: found.check_in,
                    check_out: found.check_out,
                    remarks: None,
                })
            } else if let Some((description, is_working_day)) = holiday_map.get(&day) {
                (!is_working_day).then(|| AttendanceReportRow {
                    attendance_date: day,
                    employee_id: *employee_id,
                    employee_name: employee_name.clone(),
                    status: "Holiday".to_owned(),
                    check_in: None,
                    check_out: None,
                    remarks: description.clone(),
                })
            } else if day <= today {
                Some(AttendanceReportRow {
                    attendance_date: day,
                    employee_id: *employee_id,
                    employee_name: employee_name.clone(),
                    status: "Missing".to_owned(),
                    check_in: None,
                    check_out: None,
                    remarks: None,
                })
            } else {
                None
            };

            if let Some(row) = row {
                match query.status.as_deref() {
                    Some(filter) if filter != row.status => {}
                    _ => data.push(row),
                }
            }
        }

        let Some(prev) = day.checked_sub_days(Days::new(1)) else {
            break;
        };
        day = prev;
    }

    Ok(HttpResponse::Ok().json(AttendanceReport {
        columns: attendance_columns(),
        data,
    }))
}

/* =========================
Purchase Settlement Report
========================= */

#[derive(Deserialize, IntoParams)]
pub struct PurchaseReportFilters {
    /// Defaults to one month back.
    #[param(value_type = Option<String>)]
    pub from_date: Option<NaiveDate>,
    /// Defaults to today.
    #[param(value_type = Option<String>)]
    pub to_date: Option<NaiveDate>,
    /// Vendor name fragment.
    pub vendor: Option<String>,
    /// Purchase id or bill number fragment.
    pub purchase: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PurchaseReportRow {
    pub purchase: String,
    #[schema(value_type = Option<String>, format = "date")]
    pub bill_date: Option<NaiveDate>,
    pub vendor: Option<String>,
    pub vendor_name: Option<String>,
    pub grand_total: f64,
    pub amount_paid: f64,
    pub amount_pending: f64,
    #[schema(value_type = Option<String>, format = "date")]
    pub last_payment_date: Option<NaiveDate>,
    pub payment_mode: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PurchaseReport {
    pub columns: Vec<ReportColumn>,
    pub data: Vec<PurchaseReportRow>,
    pub summary: Vec<SummaryCard>,
}

fn purchase_columns() -> Vec<ReportColumn> {
    vec![
        ReportColumn { label: "Purchase", fieldname: "purchase", fieldtype: "Link", options: Some("Purchase"), width: 150 },
        ReportColumn { label: "Bill Date", fieldname: "bill_date", fieldtype: "Date", options: None, width: 110 },
        ReportColumn { label: "Vendor", fieldname: "vendor", fieldtype: "Link", options: Some("Contacts"), width: 150 },
        ReportColumn { label: "Vendor Name", fieldname: "vendor_name", fieldtype: "Data", options: None, width: 150 },
        ReportColumn { label: "Grand Total", fieldname: "grand_total", fieldtype: "Currency", options: None, width: 120 },
        ReportColumn { label: "Paid Amount", fieldname: "amount_paid", fieldtype: "Currency", options: None, width: 130 },
        ReportColumn { label: "Pending Amount", fieldname: "amount_pending", fieldtype: "Currency", options: None, width: 120 },
        ReportColumn { label: "Last Payment Date", fieldname: "last_payment_date", fieldtype: "Date", options: None, width: 130 },
        ReportColumn { label: "Payment Mode", fieldname: "payment_mode", fieldtype: "Data", options: None, width: 120 },
    ]
}

#[derive(sqlx::FromRow)]
struct PurchaseDbRow {
    bill_no: String,
    bill_date: Option<NaiveDate>,
    vendor: Option<String>,
    vendor_name: Option<String>,
    grand_total: f64,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/purchase-settlement",
    params(PurchaseReportFilters),
    responses(
        (status = 200, description = "Purchase settlement report", body = PurchaseReport),
        (status = 403, description = "HR/Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn purchase_settlement_report(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<PurchaseReportFilters>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let today = Utc::now().date_naive();
    let from_date = query
        .from_date
        .unwrap_or_else(|| today.checked_sub_months(Months::new(1)).unwrap_or(today));
    let to_date = query.to_date.unwrap_or(today);

    enum Bind {
        Date(NaiveDate),
        Like(String),
    }

    let mut conditions = String::from("p.bill_date >= ? AND p.bill_date <= ?");
    let mut binds = vec![Bind::Date(from_date), Bind::Date(to_date)];

    if let Some(vendor) = query.vendor.as_deref() {
        conditions.push_str(" AND (p.vendor LIKE ? OR c.first_name LIKE ?)");
        let like = format!("%{}%", vendor);
        binds.push(Bind::Like(like.clone()));
        binds.push(Bind::Like(like));
    }

    if let Some(purchase) = query.purchase.as_deref() {
        conditions.push_str(" AND (p.bill_no LIKE ? OR p.id LIKE ?)");
        let like = format!("%{}%", purchase);
        binds.push(Bind::Like(like.clone()));
        binds.push(Bind::Like(like));
    }

    let purchase_sql = format!(
        r#"
        SELECT p.bill_no, p.bill_date, p.vendor, c.first_name AS vendor_name, p.grand_total
        FROM purchases p
        LEFT JOIN contacts c ON p.vendor = c.name
        WHERE {}
        ORDER BY p.bill_date DESC
        "#,
        conditions
    );

    let mut purchase_q = sqlx::query_as::<_, PurchaseDbRow>(&purchase_sql);
    for bind in binds {
        purchase_q = match bind {
            Bind::Date(d) => purchase_q.bind(d),
            Bind::Like(s) => purchase_q.bind(s),
        };
    }

    let purchases = purchase_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch purchases");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    // payments grouped per purchase
    let collections = sqlx::query_as::<_, (String, f64, Option<NaiveDate>, Option<String>)>(
        r#"
        SELECT purchase_bill_no,
               COALESCE(SUM(amount_collected), 0) AS paid,
               MAX(collection_date) AS last_date,
               MAX(mode_of_payment) AS payment_mode
        FROM purchase_collections
        GROUP BY purchase_bill_no
        "#,
    )
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch purchase collections");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let paid_map: HashMap<String, (f64, Option<NaiveDate>, Option<String>)> = collections
        .into_iter()
        .map(|(bill_no, paid, last, mode)| (bill_no, (paid, last, mode)))
        .collect();

    let mut data = Vec::with_capacity(purchases.len());
    for p in purchases {
        let (paid, last_payment_date, payment_mode) = paid_map
            .get(&p.bill_no)
            .cloned()
            .unwrap_or((0.0, None, None));

        data.push(PurchaseReportRow {
            purchase: p.bill_no,
            bill_date: p.bill_date,
            vendor: p.vendor,
            vendor_name: p.vendor_name,
            grand_total: p.grand_total,
            amount_paid: paid,
            amount_pending: p.grand_total - paid,
            last_payment_date,
            payment_mode,
        });
    }

    let total_purchased: f64 = data.iter().map(|d| d.grand_total).sum();
    let total_paid: f64 = data.iter().map(|d| d.amount_paid).sum();
    let total_pending: f64 = data.iter().map(|d| d.amount_pending).sum();

    let summary = vec![
        SummaryCard { label: "Total Purchase Amount", value: total_purchased, indicator: "blue", datatype: "Currency" },
        SummaryCard { label: "Total Paid", value: total_paid, indicator: "green", datatype: "Currency" },
        SummaryCard { label: "Total Pending", value: total_pending, indicator: "red", datatype: "Currency" },
    ];

    Ok(HttpResponse::Ok().json(PurchaseReport {
        columns: purchase_columns(),
        data,
        summary,
    }))
}
