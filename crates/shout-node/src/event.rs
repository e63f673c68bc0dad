//! Cluster events as delivered by the membership layer.

use std::fmt;

use tokio::sync::oneshot;

use crate::error::DispatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Point-to-point request expecting exactly one reply.
    Query,
    /// Fire-and-forget event with no reply path.
    Broadcast,
}

impl EventKind {
    /// Handler sub-directory for this kind.
    pub fn handler_dir(self) -> &'static str {
        match self {
            EventKind::Query => "queries",
            EventKind::Broadcast => "events",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Query => f.write_str("query"),
            EventKind::Broadcast => f.write_str("broadcast"),
        }
    }
}

/// One-shot reply capability attached to a query.
///
/// Consumed by [`Responder::respond`]; a reply larger than `max_bytes` is
/// refused the same way the transport would refuse it.
pub struct Responder {
    tx: oneshot::Sender<Vec<u8>>,
    max_bytes: Option<usize>,
}

impl Responder {
    pub fn new(tx: oneshot::Sender<Vec<u8>>) -> Self {
        Self { tx, max_bytes: None }
    }

    /// Build a responder paired with the receiver the originator waits on.
    pub fn channel() -> (Self, oneshot::Receiver<Vec<u8>>) {
        let (tx, rx) = oneshot::channel();
        (Self::new(tx), rx)
    }

    pub fn with_limit(mut self, max_bytes: usize) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    pub fn respond(self, payload: Vec<u8>) -> Result<(), DispatchError> {
        if let Some(limit) = self.max_bytes {
            if payload.len() > limit {
                return Err(DispatchError::Response(format!(
                    "response is {} bytes, limit is {limit}",
                    payload.len()
                )));
            }
        }
        self.tx
            .send(payload)
            .map_err(|_| DispatchError::Response("originator is no longer waiting".into()))
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("closed", &self.tx.is_closed())
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

#[derive(Debug)]
pub struct Event {
    pub kind: EventKind,
    pub name: String,
    pub payload: Vec<u8>,
    pub responder: Option<Responder>,
}

impl Event {
    pub fn query(name: impl Into<String>, payload: impl Into<Vec<u8>>, responder: Responder) -> Self {
        Self {
            kind: EventKind::Query,
            name: name.into(),
            payload: payload.into(),
            responder: Some(responder),
        }
    }

    pub fn broadcast(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EventKind::Broadcast,
            name: name.into(),
            payload: payload.into(),
            responder: None,
        }
    }
}
