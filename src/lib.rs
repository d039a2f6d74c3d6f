// The MIT License (MIT)
//
// Copyright (c) 2017 Will Medrano (will.s.medrano@gmail.com)
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:

// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! A low-latency audio graph server core: a port-and-connection registry, a
//! realtime cycle scheduler, and the buffer-routing model that feeds sample
//! data between hosted client callbacks.
//!
//! The crate is organized around the two execution domains a host embeds it
//! under:
//!
//! - the **control domain** ([`server::Server`] and everything it wraps —
//!   [`registry::PortRegistry`], [`connection::ConnectionSet`],
//!   [`client::ClientSession`], [`transport::Transport`],
//!   [`latency::LatencyTable`]) handles registration, connection requests,
//!   and graph compilation;
//! - the **realtime domain** ([`driver::CycleDriver`]) runs the compiled
//!   graph once per hardware period without allocating, locking, or
//!   blocking on control-domain work.
//!
//! A host constructs a [`server::Server`] from a [`config::ServerConfig`],
//! registers clients and ports, connects them, and then calls
//! [`server::Server::run_cycle`] once per audio period.

pub mod buffer;
pub mod callbacks;
pub mod client;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod flags;
pub mod graph;
pub mod ids;
pub mod latency;
pub mod notify;
pub mod port;
pub mod registry;
pub mod server;
pub mod transport;

pub use callbacks::{Control, NotificationSink, ProcessCallback, ProcessScope};
pub use client::{ClientSession, ClientState, Tie};
pub use config::ServerConfig;
pub use connection::{Connection, ConnectionSet};
pub use driver::{CycleDriver, CycleReport};
pub use error::{Result, ServerError};
pub use flags::{PortFlags, AUDIO_TYPE};
pub use graph::{CompiledGraph, GraphCompiler, Routing};
pub use ids::{ClientId, PortId};
pub use latency::LatencyTable;
pub use notify::{Notification, NotificationHub};
pub use port::{Port, PortSpec};
pub use registry::PortRegistry;
pub use server::Server;
pub use transport::{Transport, TransportInfo, TransportState};
