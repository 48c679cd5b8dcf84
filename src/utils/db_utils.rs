use actix_web::error::ErrorBadRequest;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::MySqlPool;

/// Columns an employee PATCH may touch. Anything else in the payload is a
/// bad request, never silently ignored.
pub const EMPLOYEE_UPDATABLE_COLUMNS: [&str; 7] = [
    "employee_code",
    "employee_name",
    "email",
    "personal_email",
    "date_of_joining",
    "skip_probation",
    "status",
];

#[derive(Debug)]
pub enum SqlValue {
    String(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds `UPDATE <table> SET ... WHERE <id_column> = ?` from a JSON
/// payload, restricted to the given column whitelist.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed_columns: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, actix_web::Error> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ErrorBadRequest("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ErrorBadRequest("No fields provided for update"));
    }

    for key in obj.keys() {
        if !allowed_columns.contains(&key.as_str()) {
            return Err(ErrorBadRequest(format!("Unknown field: {}", key)));
        }
    }

    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);

    for value in obj.values() {
        match value {
            Value::String(s) => {
                if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    values.push(SqlValue::Date(d));
                } else {
                    values.push(SqlValue::String(s.clone()));
                }
            }
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    values.push(SqlValue::I64(i));
                } else if let Some(f) = n.as_f64() {
                    values.push(SqlValue::F64(f));
                }
            }
            Value::Bool(b) => values.push(SqlValue::Bool(*b)),
            Value::Null => values.push(SqlValue::Null),
            _ => return Err(ErrorBadRequest("Unsupported JSON value type")),
        }
    }

    values.push(SqlValue::I64(id_value as i64));

    Ok(SqlUpdate { sql, values })
}

pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whitelist_rejects_unknown_columns() {
        let payload = json!({"employee_name": "Jane", "salary": 1});
        let err = build_update_sql("employees", &payload, &EMPLOYEE_UPDATABLE_COLUMNS, "id", 7)
            .unwrap_err();
        assert!(err.to_string().contains("salary"));
    }

    #[test]
    fn dates_are_detected_in_string_values() {
        let payload = json!({"date_of_joining": "2024-05-01"});
        let update = build_update_sql("employees", &payload, &EMPLOYEE_UPDATABLE_COLUMNS, "id", 7)
            .unwrap();
        assert_eq!(update.sql, "UPDATE employees SET date_of_joining = ? WHERE id = ?");
        assert!(matches!(update.values[0], SqlValue::Date(_)));
        assert!(matches!(update.values[1], SqlValue::I64(7)));
    }
}
