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

//! The shared frame counter and timebase master role (§4.7).

use crate::ids::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Stopped,
    Rolling,
}

/// Read-only transport info a client's process callback may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportInfo {
    pub state: TransportState,
    pub frame: u64,
}

/// The frame counter, roll state, and timebase master seat.
///
/// Election is first-wins by default (§4.7: "taking the role succeeds only
/// if currently vacant"): whichever client asks first, while the seat is
/// vacant, gets it. [`Transport::request_timebase`] also accepts an
/// unconditional mode that seizes an already-held seat; see `DESIGN.md` for
/// why that path exists and when it's actually used. The seat is released
/// automatically on that client's death or deactivation.
pub struct Transport {
    state: TransportState,
    frame: u64,
    timebase_master: Option<ClientId>,
}

impl Transport {
    pub fn new() -> Self {
        Transport {
            state: TransportState::Stopped,
            frame: 0,
            timebase_master: None,
        }
    }

    pub fn info(&self) -> TransportInfo {
        TransportInfo {
            state: self.state,
            frame: self.frame,
        }
    }

    pub fn start(&mut self) {
        self.state = TransportState::Rolling;
    }

    pub fn stop(&mut self) {
        self.state = TransportState::Stopped;
    }

    pub fn relocate(&mut self, frame: u64) {
        self.frame = frame;
    }

    /// Advances the frame counter by one cycle's worth of frames, only while
    /// rolling.
    pub fn advance(&mut self, n_frames: u32) {
        if self.state == TransportState::Rolling {
            self.frame += n_frames as u64;
        }
    }

    pub fn timebase_master(&self) -> Option<ClientId> {
        self.timebase_master
    }

    /// `true` if `requester` holds (or just took) the timebase seat.
    /// `conditional` mirrors the original's "only take over if vacant"
    /// flag; an unconditional request forcibly seizes the seat.
    pub fn request_timebase(&mut self, requester: ClientId, conditional: bool) -> bool {
        match self.timebase_master {
            None => {
                self.timebase_master = Some(requester);
                true
            }
            Some(current) if current == requester => true,
            Some(_) if conditional => false,
            Some(_) => {
                self.timebase_master = Some(requester);
                true
            }
        }
    }

    /// Called when a client dies or deactivates; vacates the seat if it was
    /// the one holding it.
    pub fn release_timebase_if_held_by(&mut self, client: ClientId) {
        if self.timebase_master == Some(client) {
            self.timebase_master = None;
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::new()
    }
}
