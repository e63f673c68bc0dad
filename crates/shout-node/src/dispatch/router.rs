//! Delivers query replies and records broadcast outcomes.

use crate::dispatch::executor::ExecResult;
use crate::error::DispatchError;
use crate::event::Responder;

pub fn respond(responder: Option<Responder>, body: Vec<u8>) -> Result<(), DispatchError> {
    let responder =
        responder.ok_or_else(|| DispatchError::Response("query carries no responder".into()))?;
    let len = body.len();
    responder.respond(body)?;
    tracing::debug!(bytes = len, "sent query response");
    Ok(())
}

pub fn record_exec(name: &str, result: ExecResult) {
    tracing::info!(event = name, rows_affected = result.rows_affected, "applied broadcast");
}
