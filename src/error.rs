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

use thiserror::Error;

/// Every failure kind the control domain can report to a caller.
///
/// Realtime-domain failures (`Overrun`, `ClientLost`) never propagate through
/// this type into a client callback; they are delivered as notifications
/// (see [`crate::notify`]) and only surface here when a control-domain
/// operation queries past-cycle state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// A port, client, or connection referenced by name or id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A port name, or a connection, already exists.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// Two ports were asked to connect but their type tokens differ.
    #[error("type mismatch: {source_type} != {destination_type}")]
    TypeMismatch {
        source_type: String,
        destination_type: String,
    },

    /// The direction flags of the two endpoints do not satisfy
    /// source-is-output, destination-is-input.
    #[error("wrong direction for connection {source_port} -> {destination}")]
    WrongDirection { source_port: String, destination: String },

    /// The port is locked by a client other than the caller.
    #[error("port {0} is locked by another client")]
    Locked(String),

    /// Installing the requested edge would make the client-level graph cyclic.
    #[error("connecting {source_port} -> {destination} would introduce a cycle")]
    WouldCycle { source_port: String, destination: String },

    /// The caller's client session is not in a state that permits this call.
    #[error("invalid state for client {client}: {reason}")]
    InvalidState { client: String, reason: String },

    /// A client missed its cycle deadline. Carried for completeness; this
    /// variant is only ever seen via notifications, never returned from a
    /// control-domain call.
    #[error("client {0} overran its cycle deadline")]
    Overrun(String),

    /// A client was evicted after repeated overrun or a detected death.
    #[error("client {0} was lost and evicted")]
    ClientLost(String),
}

/// Convenience alias used throughout the control-domain API.
pub type Result<T> = std::result::Result<T, ServerError>;
