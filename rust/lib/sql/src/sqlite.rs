use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, ErrorCode};
use tracing::debug;

use crate::error::SQLError;
use crate::traits::{Row, SQLExec, SQLStore, Value};

/// SqliteStore is a SQLStore implementation backed by rusqlite (bundled SQLite).
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self, SQLError> {
        let conn = Connection::open(path)
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        // WAL for concurrent readers; foreign keys are off by default in SQLite.
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;

        debug!("opened sqlite store at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self, SQLError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| SQLError::Connection(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Convert our Value enum to rusqlite's ToSql.
fn bind_params(params: &[Value]) -> Vec<Box<dyn rusqlite::types::ToSql + '_>> {
    params
        .iter()
        .map(|v| -> Box<dyn rusqlite::types::ToSql + '_> {
            match v {
                Value::Null => Box::new(rusqlite::types::Null),
                Value::Integer(i) => Box::new(*i),
                Value::Real(f) => Box::new(*f),
                Value::Text(s) => Box::new(s.as_str()),
                Value::Blob(b) => Box::new(b.as_slice()),
            }
        })
        .collect()
}

/// Map an execution failure, singling out constraint violations.
fn exec_error(e: rusqlite::Error) -> SQLError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, ref msg)
            if err.code == ErrorCode::ConstraintViolation =>
        {
            SQLError::Constraint(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        other => SQLError::Execution(other.to_string()),
    }
}

fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            let mut columns = Vec::new();
            for (i, name) in column_names.iter().enumerate() {
                let val = row_value_at(row, i);
                columns.push((name.clone(), val));
            }
            Ok(Row { columns })
        })
        .map_err(|e| SQLError::Query(e.to_string()))?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row.map_err(|e| SQLError::Query(e.to_string()))?);
    }
    Ok(result)
}

fn exec_on(conn: &Connection, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let bound = bind_params(params);
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        bound.iter().map(|b| b.as_ref()).collect();

    let affected = conn
        .execute(sql, param_refs.as_slice())
        .map_err(exec_error)?;

    Ok(affected as u64)
}

impl SQLExec for SqliteStore {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Query(e.to_string()))?;
        query_on(&conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;
        exec_on(&conn, sql, params)
    }
}

/// Statement executor bound to an open transaction.
struct TxExec<'a> {
    conn: &'a Connection,
}

impl SQLExec for TxExec<'_> {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
        query_on(self.conn, sql, params)
    }

    fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
        exec_on(self.conn, sql, params)
    }
}

impl SQLStore for SqliteStore {
    fn transaction(
        &self,
        body: &mut dyn FnMut(&dyn SQLExec) -> Result<(), SQLError>,
    ) -> Result<(), SQLError> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        let tx = conn
            .transaction()
            .map_err(|e| SQLError::Execution(e.to_string()))?;

        // Dropping `tx` without commit rolls back.
        body(&TxExec { conn: &tx })?;

        tx.commit().map_err(|e| SQLError::Execution(e.to_string()))
    }
}

/// Extract a Value from a rusqlite row at a given column index.
fn row_value_at(row: &rusqlite::Row, idx: usize) -> Value {
    // Try integer first, then real, then text, then blob, then null.
    if let Ok(i) = row.get::<_, i64>(idx) {
        return Value::Integer(i);
    }
    if let Ok(f) = row.get::<_, f64>(idx) {
        return Value::Real(f);
    }
    if let Ok(s) = row.get::<_, String>(idx) {
        return Value::Text(s);
    }
    if let Ok(b) = row.get::<_, Vec<u8>>(idx) {
        return Value::Blob(b);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .exec(
                "CREATE TABLE slots (code TEXT NOT NULL, port INTEGER NOT NULL, UNIQUE(code, port))",
                &[],
            )
            .unwrap();
        store
    }

    fn count(store: &SqliteStore) -> i64 {
        let rows = store.query("SELECT COUNT(*) AS cnt FROM slots", &[]).unwrap();
        rows[0].get_i64("cnt").unwrap()
    }

    #[test]
    fn insert_and_query() {
        let store = test_store();
        let n = store
            .exec(
                "INSERT INTO slots (code, port) VALUES (?1, ?2)",
                &[Value::Text("SITE-7".into()), Value::Integer(3)],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = store
            .query("SELECT code, port FROM slots WHERE code = ?1", &[Value::Text("SITE-7".into())])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("code"), Some("SITE-7"));
        assert_eq!(rows[0].get_i64("port"), Some(3));
    }

    #[test]
    fn unique_violation_is_constraint_error() {
        let store = test_store();
        let params = [Value::Text("SITE-7".into()), Value::Integer(1)];
        store.exec("INSERT INTO slots (code, port) VALUES (?1, ?2)", &params).unwrap();
        let err = store
            .exec("INSERT INTO slots (code, port) VALUES (?1, ?2)", &params)
            .unwrap_err();
        assert!(err.is_constraint(), "got {err:?}");
    }

    #[test]
    fn transaction_commits() {
        let store = test_store();
        store
            .transaction(&mut |tx: &dyn SQLExec| {
                tx.exec("INSERT INTO slots (code, port) VALUES ('A', 1)", &[])?;
                tx.exec("INSERT INTO slots (code, port) VALUES ('A', 2)", &[])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count(&store), 2);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = test_store();
        let err = store
            .transaction(&mut |tx: &dyn SQLExec| {
                tx.exec("INSERT INTO slots (code, port) VALUES ('A', 1)", &[])?;
                Err(SQLError::Aborted("second write refused".into()))
            })
            .unwrap_err();
        assert!(matches!(err, SQLError::Aborted(_)));
        assert_eq!(count(&store), 0);
    }

    #[test]
    fn transaction_rolls_back_on_constraint() {
        let store = test_store();
        store.exec("INSERT INTO slots (code, port) VALUES ('A', 2)", &[]).unwrap();
        let err = store
            .transaction(&mut |tx: &dyn SQLExec| {
                tx.exec("INSERT INTO slots (code, port) VALUES ('A', 1)", &[])?;
                tx.exec("INSERT INTO slots (code, port) VALUES ('A', 2)", &[])?;
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_constraint());
        assert_eq!(count(&store), 1);
    }
}
