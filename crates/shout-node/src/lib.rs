//! Event-driven SQL dispatch for shout nodes.
//!
//! Cluster events (queries and broadcasts) arrive from a membership layer and
//! are mapped by name to SQL handler files. The payload binds as named
//! parameters, the statement runs against the node's SQLite database, and
//! query results go back to the originator as a JSON array of rows.

pub mod config;
pub mod control;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod membership;
pub mod node;

pub use config::NodeConfig;
pub use control::{ControlClient, ControlError, RequestEnvelope, ResponseEnvelope};
pub use daemon::{DispatchLoop, DispatchStats, LoopState};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{DispatchError, NodeError};
pub use event::{Event, EventKind, Responder};
pub use membership::{ChannelMembership, LocalAgent, Member, MemberStatus, Membership, Subscription};
pub use node::Node;
