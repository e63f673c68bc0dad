//! Membership layer seam.
//!
//! The dispatch loop only needs an event stream and a shutdown signal. A
//! [`Membership`] implementation supplies both once it has started, and keeps
//! the per-query reply capability inside each [`Event`].

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::config::NodeConfig;
use crate::control::{ControlContext, ControlServer};
use crate::error::NodeError;
use crate::event::Event;

/// Channels handed to the dispatch loop once the membership layer is ready.
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<Event>,
    pub shutdown: broadcast::Receiver<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Alive,
    Leaving,
    Left,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub addr: String,
    pub port: u16,
    pub status: MemberStatus,
}

#[async_trait]
pub trait Membership: Send {
    /// Start the layer. Returns once it is ready to deliver events.
    async fn start(&mut self) -> Result<Subscription, NodeError>;

    /// Sender that fires the shutdown signal.
    fn shutdown_handle(&self) -> broadcast::Sender<()>;

    fn members(&self) -> Vec<Member>;

    /// Wait for background tasks after the dispatch loop returned.
    async fn stop(&mut self) {}
}

/// In-process membership: events are pushed through [`ChannelMembership::sender`].
pub struct ChannelMembership {
    node_name: String,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Option<mpsc::UnboundedReceiver<Event>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ChannelMembership {
    pub fn new(node_name: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            node_name: node_name.into(),
            events_tx,
            events_rx: Some(events_rx),
            shutdown_tx,
        }
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.events_tx.clone()
    }
}

#[async_trait]
impl Membership for ChannelMembership {
    async fn start(&mut self) -> Result<Subscription, NodeError> {
        let events = self
            .events_rx
            .take()
            .ok_or_else(|| NodeError::Membership("membership already started".into()))?;
        Ok(Subscription {
            events,
            shutdown: self.shutdown_tx.subscribe(),
        })
    }

    fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    fn members(&self) -> Vec<Member> {
        vec![Member {
            name: self.node_name.clone(),
            addr: "local".into(),
            port: 0,
            status: MemberStatus::Alive,
        }]
    }
}

/// Single-node agent fed by the control-plane listener.
///
/// Binding the listener is the readiness point: `start` fails if the address
/// is taken and otherwise returns with the server already accepting.
pub struct LocalAgent {
    node_name: String,
    rpc_addr: String,
    memberlist_port: u16,
    query_timeout: Duration,
    max_response_bytes: usize,
    shutdown_tx: broadcast::Sender<()>,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<()>>,
}

impl LocalAgent {
    pub fn new(config: &NodeConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            node_name: config.node_name.clone(),
            rpc_addr: config.rpc_addr.clone(),
            memberlist_port: config.memberlist_port,
            query_timeout: config.query_timeout,
            max_response_bytes: config.max_response_bytes,
            shutdown_tx,
            local_addr: None,
            server: None,
        }
    }

    /// Address the control listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn self_member(&self, status: MemberStatus) -> Member {
        let addr = self
            .local_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| self.rpc_addr.clone());
        Member {
            name: self.node_name.clone(),
            addr,
            port: self.memberlist_port,
            status,
        }
    }
}

#[async_trait]
impl Membership for LocalAgent {
    async fn start(&mut self) -> Result<Subscription, NodeError> {
        if self.server.is_some() {
            return Err(NodeError::Membership("agent already started".into()));
        }
        let listener = TcpListener::bind(&self.rpc_addr)
            .await
            .map_err(|source| NodeError::Bind {
                addr: self.rpc_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| NodeError::Bind {
            addr: self.rpc_addr.clone(),
            source,
        })?;
        self.local_addr = Some(local_addr);

        let (events_tx, events) = mpsc::unbounded_channel();
        let shutdown = self.shutdown_tx.subscribe();
        let context = ControlContext {
            node_name: self.node_name.clone(),
            events_tx,
            members: vec![self.self_member(MemberStatus::Alive)],
            query_timeout: self.query_timeout,
            max_response_bytes: self.max_response_bytes,
        };
        let server = ControlServer::new(listener, context, self.shutdown_tx.clone());
        self.server = Some(tokio::spawn(server.run()));
        tracing::info!(node = %self.node_name, addr = %local_addr, "control listener ready");

        Ok(Subscription { events, shutdown })
    }

    fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    fn members(&self) -> Vec<Member> {
        let status = if self.server.is_some() {
            MemberStatus::Alive
        } else {
            MemberStatus::Left
        };
        vec![self.self_member(status)]
    }

    async fn stop(&mut self) {
        // The server also listens for the shutdown signal; make sure it fired
        // when the loop ended because the event stream closed.
        let _ = self.shutdown_tx.send(());
        if let Some(handle) = self.server.take() {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_membership_starts_once() {
        let mut membership = ChannelMembership::new("n1");
        let _sub = membership.start().await.expect("start");
        let err = membership.start().await.unwrap_err();
        assert!(matches!(err, NodeError::Membership(_)));
    }

    #[tokio::test]
    async fn local_agent_reports_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let config = NodeConfig {
            rpc_addr: taken.local_addr().expect("addr").to_string(),
            ..NodeConfig::default()
        };
        let mut agent = LocalAgent::new(&config);
        let err = agent.start().await.unwrap_err();
        assert!(matches!(err, NodeError::Bind { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn local_agent_lists_itself() {
        let config = NodeConfig {
            node_name: "alpha".into(),
            rpc_addr: "127.0.0.1:0".into(),
            ..NodeConfig::default()
        };
        let mut agent = LocalAgent::new(&config);
        assert_eq!(agent.members()[0].status, MemberStatus::Left);
        let _sub = agent.start().await.expect("start");
        let members = agent.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "alpha");
        assert_eq!(members[0].addr, "127.0.0.1");
        assert_eq!(members[0].status, MemberStatus::Alive);
        agent.stop().await;
    }
}
