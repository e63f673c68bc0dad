//! Per-event pipeline: resolve, bind, execute, encode, route.
//!
//! [`Dispatcher::dispatch`] handles one event end to end and returns a tagged
//! error instead of logging it; the dispatch loop decides what to do with it.

pub mod binder;
pub mod encoder;
pub mod executor;
pub mod resolver;
pub mod router;

use std::path::PathBuf;

use shout_db::Database;

use crate::error::DispatchError;
use crate::event::Event;

pub use binder::{ParamValue, ParameterSet, bind_payload};
pub use encoder::encode_rows;
pub use executor::{Cell, ExecResult, RowSet, StatementResult};
pub use resolver::{HandlerDescriptor, HandlerResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A query reply was delivered with this many rows.
    Responded { rows: usize },
    /// A broadcast statement ran.
    Applied(ExecResult),
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    resolver: HandlerResolver,
    db: Database,
}

impl Dispatcher {
    pub fn new(handlers_root: impl Into<PathBuf>, db: Database) -> Self {
        Self {
            resolver: HandlerResolver::new(handlers_root),
            db,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn dispatch(&self, event: Event) -> Result<Outcome, DispatchError> {
        let Event {
            kind,
            name,
            payload,
            responder,
        } = event;
        let span = tracing::info_span!("dispatch", %kind, event = %name);
        let _entered = span.enter();

        let handler = self.resolver.resolve(kind, &name)?;
        let sql = handler.read_sql()?;
        let params = bind_payload(&payload)?;

        let result = {
            let conn = self
                .db
                .connection()
                .map_err(|e| DispatchError::ConnectionAcquire(e.to_string()))?;
            executor::execute(conn.connection(), kind, &sql, &params)?
        };

        match result {
            StatementResult::Rows(rows) => {
                let body = encode_rows(&rows)?;
                router::respond(responder, body)?;
                Ok(Outcome::Responded { rows: rows.len() })
            }
            StatementResult::Exec(exec) => {
                router::record_exec(&name, exec);
                Ok(Outcome::Applied(exec))
            }
        }
    }
}
