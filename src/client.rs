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

use std::collections::HashSet;

use crate::callbacks::ProcessCallback;
use crate::ids::{ClientId, PortId};

/// Where a client session sits in its lifecycle (§3 Lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake complete, not yet scheduled.
    Registered,
    /// Eligible for scheduling; appears in the run-list once the graph next
    /// compiles.
    Active,
    /// Marked dead or evicted; shutdown handler scheduled, ports pending
    /// removal at the next compile.
    Dying,
    /// Fully removed; the session entry is about to be dropped.
    Dead,
}

/// A same-client in\u{2192}out shortcut: data arriving at `input` is copied to
/// `output` after the owning client's callback returns, bypassing whatever
/// the callback wrote (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tie {
    pub input: PortId,
    pub output: PortId,
}

pub struct ClientSession {
    pub(crate) id: ClientId,
    pub(crate) name: String,
    pub(crate) state: ClientState,
    pub(crate) callback: Box<dyn ProcessCallback>,
    pub(crate) ties: HashSet<Tie>,
    pub(crate) is_timebase_master: bool,
    pub(crate) overrun_count: u64,
    pub(crate) consecutive_overruns: u32,
}

impl ClientSession {
    pub fn new(id: ClientId, name: String, callback: Box<dyn ProcessCallback>) -> Self {
        ClientSession {
            id,
            name,
            state: ClientState::Registered,
            callback,
            ties: HashSet::new(),
            is_timebase_master: false,
            overrun_count: 0,
            consecutive_overruns: 0,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ClientState::Active
    }

    pub fn is_timebase_master(&self) -> bool {
        self.is_timebase_master
    }

    pub fn overrun_count(&self) -> u64 {
        self.overrun_count
    }

    /// Consecutive overruns since the last cycle this client completed on
    /// time, reset to zero whenever it returns a non-overrun result.
    pub fn consecutive_overruns(&self) -> u32 {
        self.consecutive_overruns
    }

    /// A same-client `input` must tie to an `output`; both checks mirror
    /// `jack_port_tie`'s documented direction contract.
    pub fn tie(&mut self, input: PortId, output: PortId) {
        self.ties.insert(Tie { input, output });
    }

    /// Idempotent: removing a tie that is not present is not an error (§9,
    /// "Untie semantics" — the spec's resolution of the original's unscoped
    /// single-port `untie`).
    pub fn untie(&mut self, output: PortId) {
        self.ties.retain(|tie| tie.output != output);
    }

    pub fn ties(&self) -> impl Iterator<Item = &Tie> {
        self.ties.iter()
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("ties", &self.ties)
            .finish()
    }
}
