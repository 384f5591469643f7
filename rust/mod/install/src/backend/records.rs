//! JSON-document record helpers shared by every table.
//!
//! Generic over [`SQLExec`] so the same code runs on the store itself and
//! inside a transaction.

use serde::de::DeserializeOwned;
use serde::Serialize;

use invent_core::ServiceError;
use invent_sql::{Row, SQLError, SQLExec, Value};

/// Constraint violations become conflicts, everything else is a storage failure.
pub(crate) fn sql_error(err: SQLError) -> ServiceError {
    if err.is_constraint() {
        ServiceError::Conflict(err.to_string())
    } else {
        ServiceError::Storage(err.to_string())
    }
}

/// Insert a record as JSON with its indexed columns.
pub(crate) fn insert_record<E, T>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), ServiceError>
where
    E: SQLExec + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut cols = vec!["id", "data"];
    let mut placeholders = vec!["?1".to_string(), "?2".to_string()];
    let mut params = vec![Value::Text(id.to_string()), Value::Text(json)];

    for (i, (col, val)) in indexes.iter().enumerate() {
        cols.push(col);
        placeholders.push(format!("?{}", i + 3));
        params.push(val.clone());
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        cols.join(", "),
        placeholders.join(", "),
    );
    db.exec(&sql, &params).map_err(sql_error)?;
    Ok(())
}

/// Overwrite a record's JSON and indexed columns. Missing id is `NotFound`.
pub(crate) fn update_record<E, T>(
    db: &E,
    table: &str,
    id: &str,
    record: &T,
    indexes: &[(&str, Value)],
) -> Result<(), ServiceError>
where
    E: SQLExec + ?Sized,
    T: Serialize,
{
    let json = serde_json::to_string(record).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let mut sets = vec!["data = ?1".to_string()];
    let mut params = vec![Value::Text(json)];
    for (i, (col, val)) in indexes.iter().enumerate() {
        sets.push(format!("{} = ?{}", col, i + 2));
        params.push(val.clone());
    }
    let id_idx = params.len() + 1;
    params.push(Value::Text(id.to_string()));

    let sql = format!("UPDATE {} SET {} WHERE id = ?{}", table, sets.join(", "), id_idx);
    let affected = db.exec(&sql, &params).map_err(sql_error)?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("{}/{}", table, id)));
    }
    Ok(())
}

/// Delete by id; returns whether a row was removed.
pub(crate) fn delete_record<E>(db: &E, table: &str, id: &str) -> Result<bool, ServiceError>
where
    E: SQLExec + ?Sized,
{
    let sql = format!("DELETE FROM {} WHERE id = ?1", table);
    let affected = db
        .exec(&sql, &[Value::Text(id.to_string())])
        .map_err(sql_error)?;
    Ok(affected > 0)
}

pub(crate) fn find_record<E, T>(db: &E, table: &str, id: &str) -> Result<Option<T>, ServiceError>
where
    E: SQLExec + ?Sized,
    T: DeserializeOwned,
{
    find_one_by(db, table, "id", Value::Text(id.to_string()))
}

/// First record whose `column` equals `value`, in insertion order.
pub(crate) fn find_one_by<E, T>(
    db: &E,
    table: &str,
    column: &str,
    value: Value,
) -> Result<Option<T>, ServiceError>
where
    E: SQLExec + ?Sized,
    T: DeserializeOwned,
{
    let sql = format!(
        "SELECT data FROM {} WHERE {} = ?1 ORDER BY rowid LIMIT 1",
        table, column
    );
    let rows = db.query(&sql, &[value]).map_err(sql_error)?;
    rows.first().map(decode_row).transpose()
}

/// Every record whose `column` equals `value`, ordered by `order_by`.
pub(crate) fn list_by<E, T>(
    db: &E,
    table: &str,
    column: &str,
    value: Value,
    order_by: &str,
) -> Result<Vec<T>, ServiceError>
where
    E: SQLExec + ?Sized,
    T: DeserializeOwned,
{
    let sql = format!(
        "SELECT data FROM {} WHERE {} = ?1 ORDER BY {}",
        table, column, order_by
    );
    let rows = db.query(&sql, &[value]).map_err(sql_error)?;
    rows.iter().map(decode_row).collect()
}

fn decode_row<T: DeserializeOwned>(row: &Row) -> Result<T, ServiceError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Internal("missing data column".into()))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Internal(e.to_string()))
}
