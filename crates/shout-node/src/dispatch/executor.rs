//! Statement execution on a scoped connection.

use shout_db::rusqlite::types::ValueRef;
use shout_db::rusqlite::{Batch, Connection, Error as SqlError, Statement};

use crate::dispatch::binder::ParameterSet;
use crate::error::DispatchError;
use crate::event::EventKind;

/// One cell as SQLite reported it.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    /// Raw TEXT bytes; validated as UTF-8 when encoded.
    Text(Vec<u8>),
    Blob(Vec<u8>),
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(t.to_vec()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

/// Result of a read statement. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecResult {
    pub rows_affected: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    Rows(RowSet),
    Exec(ExecResult),
}

/// Run `sql` on the read path for queries and the write path for broadcasts.
pub fn execute(
    conn: &Connection,
    kind: EventKind,
    sql: &str,
    params: &ParameterSet,
) -> Result<StatementResult, DispatchError> {
    match kind {
        EventKind::Query => query(conn, sql, params).map(StatementResult::Rows),
        EventKind::Broadcast => exec(conn, sql, params).map(StatementResult::Exec),
    }
}

/// Prepare the single statement of a handler.
///
/// Trailing whitespace and comments are fine; a second statement is a
/// `MultipleStatement` execution error.
fn prepare_one<'c>(conn: &'c Connection, sql: &str) -> Result<Statement<'c>, DispatchError> {
    let mut batch = Batch::new(conn, sql);
    let Some(stmt) = batch.next()? else {
        return Ok(conn.prepare(sql)?);
    };
    if batch.next()?.is_some() {
        return Err(SqlError::MultipleStatement.into());
    }
    Ok(stmt)
}

pub fn query(conn: &Connection, sql: &str, params: &ParameterSet) -> Result<RowSet, DispatchError> {
    let mut stmt = prepare_one(conn, sql)?;
    params.bind_to(&mut stmt)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let cells = (0..columns.len())
            .map(|i| row.get_ref(i).map(Cell::from))
            .collect::<Result<Vec<_>, _>>()?;
        out.push(cells);
    }
    Ok(RowSet { columns, rows: out })
}

pub fn exec(conn: &Connection, sql: &str, params: &ParameterSet) -> Result<ExecResult, DispatchError> {
    let mut stmt = prepare_one(conn, sql)?;
    params.bind_to(&mut stmt)?;
    let rows_affected = stmt.raw_execute()?;
    Ok(ExecResult { rows_affected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::binder::bind_payload;

    fn users() -> Connection {
        let conn = Connection::open_in_memory().expect("mem");
        conn.execute_batch(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, score REAL, avatar BLOB);
             INSERT INTO users VALUES (1, 'Alice', 9.5, x'0102');
             INSERT INTO users VALUES (2, 'Bob', NULL, NULL);",
        )
        .expect("seed");
        conn
    }

    #[test]
    fn query_returns_columns_in_statement_order() {
        let conn = users();
        let params = bind_payload(br#"{"id":1}"#).expect("bind");
        let rows = query(&conn, "SELECT name, id, score, avatar FROM users WHERE id = :id", &params)
            .expect("query");
        assert_eq!(rows.columns, vec!["name", "id", "score", "avatar"]);
        assert_eq!(
            rows.rows,
            vec![vec![
                Cell::Text(b"Alice".to_vec()),
                Cell::Integer(1),
                Cell::Real(9.5),
                Cell::Blob(vec![1, 2]),
            ]]
        );
    }

    #[test]
    fn query_with_no_matches_keeps_columns() {
        let conn = users();
        let params = bind_payload(br#"{"id":99}"#).expect("bind");
        let rows = query(&conn, "SELECT id, name FROM users WHERE id = :id\n", &params)
            .expect("query");
        assert!(rows.is_empty());
        assert_eq!(rows.columns, vec!["id", "name"]);
    }

    #[test]
    fn exec_reports_rows_affected() {
        let conn = users();
        let params = bind_payload(br#"{"name":"Carol"}"#).expect("bind");
        let result = execute(
            &conn,
            EventKind::Broadcast,
            "UPDATE users SET name = :name",
            &params,
        )
        .expect("exec");
        assert_eq!(result, StatementResult::Exec(ExecResult { rows_affected: 2 }));
    }

    #[test]
    fn sql_errors_are_execution_errors() {
        let conn = users();
        let params = ParameterSet::default();
        let err = query(&conn, "SELEC nonsense", &params).unwrap_err();
        assert!(matches!(err, DispatchError::Execution(_)), "got {err:?}");

        let err = exec(&conn, "INSERT INTO users (id) VALUES (1)", &params).unwrap_err();
        assert!(matches!(err, DispatchError::Execution(_)), "got {err:?}");
        assert_eq!(err.kind(), "execution");
    }

    #[test]
    fn second_statement_is_rejected_and_not_run() {
        let conn = users();
        let params = ParameterSet::default();

        let err = exec(
            &conn,
            "INSERT INTO users (id) VALUES (3); INSERT INTO users (id) VALUES (4);",
            &params,
        )
        .unwrap_err();
        assert!(
            matches!(err, DispatchError::Execution(SqlError::MultipleStatement)),
            "got {err:?}"
        );
        let count: i64 = conn
            .query_row("SELECT count(*) FROM users", [], |row| row.get(0))
            .expect("count");
        assert_eq!(count, 2);

        let err = query(&conn, "SELECT 1 AS a; DROP TABLE users;", &params).unwrap_err();
        assert!(matches!(err, DispatchError::Execution(SqlError::MultipleStatement)));
        assert!(query(&conn, "SELECT count(*) AS n FROM users", &params).is_ok());
    }

    #[test]
    fn trailing_comments_and_semicolon_are_allowed() {
        let conn = users();
        let params = ParameterSet::default();
        let rows = query(&conn, "SELECT id FROM users; -- all users\n\n", &params).expect("query");
        assert_eq!(rows.len(), 2);
        let result = exec(&conn, "DELETE FROM users WHERE id = 2;\n/* cleanup */", &params)
            .expect("exec");
        assert_eq!(result.rows_affected, 1);
    }
}
