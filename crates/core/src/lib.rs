//! Aircast core: session orchestration for peer-to-peer live audio broadcast.
//!
//! One node per participant. A node acquires a session identity from the
//! signaling service, accepts or initiates data-connections, and, in the
//! broadcaster role, fans its captured audio stream out to every joined
//! peer, including peers that join mid-broadcast. Listeners answer inbound
//! calls with no outbound media and route the received stream to playback.
//!
//! # Architecture
//!
//! - [`session::SessionNode`]: the connection-lifecycle state machine; every
//!   transport event, capture completion, and operator command flows through
//!   its single `handle` entry point and comes back out as actions.
//! - [`session::ConnectionRegistry`]: insertion-ordered set of joined peers,
//!   the single source of truth for membership.
//! - [`media::BroadcastPipeline`]: stream acquisition and standing per-peer
//!   fan-out while a broadcast is active.
//! - [`media::WaveformSampler`]: pull-based time-domain frames for a live
//!   amplitude trace.
//! - [`transport::PeerTransport`] and [`capture::CaptureSource`]: the
//!   collaborator boundaries; [`transport::MemoryHub`] connects nodes
//!   in-process, and platform capture lives in adapter crates.
//! - [`session::SessionRunner`]: the async driver, a single cooperative
//!   loop handling one message to completion at a time.
//!
//! # Example
//!
//! Driving the state machine directly:
//!
//! ```
//! use aircast_core::session::{Command, Role, SessionNode, TransportEvent};
//! use aircast_core::PeerId;
//!
//! let mut node = SessionNode::new();
//! node.handle(TransportEvent::IdentityAssigned(PeerId::from("abc123")).into());
//! node.handle(Command::SetRole(Role::Broadcaster).into());
//!
//! assert_eq!(node.identity(), Some(&PeerId::from("abc123")));
//! assert_eq!(node.role(), Role::Broadcaster);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod config;
pub mod error;
pub mod identity;
pub mod media;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use error::{CaptureError, Error, Result};
pub use identity::PeerId;
