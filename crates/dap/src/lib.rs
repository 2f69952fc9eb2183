//! A (partial) DAP implementation, sufficient to debug shader programs
//! running inside the driver.
//!
//! See: <https://microsoft.github.io/debug-adapter-protocol/overview>
//!
//! This crate implements only a subset of DAP. Not all requests are modeled,
//! because the driver's debug subsystem doesn't support them (there are no
//! data breakpoints, no goto targets, etc). These request kinds are
//! controlled by the capabilities advertised in the initialize response, so
//! editors should not send requests this server doesn't claim to support.
//!
//! Many fields in the DAP requests, responses, events, and types are
//! optional, and this implementation excludes optional fields we never
//! populate, relying on the default serde behavior of skipping unknown
//! fields during deserialization.
//!
//! Unlike a debug adapter that talks to its client over stdio, this server
//! listens on a TCP port and accepts connections from debugger UIs. Each
//! accepted [`connection::Connection`] runs a receive thread and a dispatch
//! thread; handlers are registered on a shared [`session::Session`] keyed by
//! DAP command string.
#![warn(missing_docs)]

pub mod connection;
pub mod events;
pub mod framing;
pub mod protocol;
pub mod requests;
pub mod responses;
pub mod server;
pub mod session;
pub mod types;

pub use connection::Connection;
pub use protocol::{Error, Event, Request};
pub use server::Server;
pub use session::Session;
