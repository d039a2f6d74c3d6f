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

//! Boundaries a hosted client crosses into and out of the core (§6, External
//! Interfaces). Everything in this module runs on the realtime thread except
//! [`NotificationSink`], which runs on the control thread.

use crate::buffer::BufferSet;
use crate::ids::PortId;

/// What a client's [`ProcessCallback::process`] tells the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// The per-cycle view a client gets of its own ports' buffers.
///
/// Borrowed from the driver's [`BufferSet`] for the duration of one
/// `process` call; it never outlives the cycle it was built for.
pub struct ProcessScope<'a> {
    buffers: &'a BufferSet,
    n_frames: u32,
}

impl<'a> ProcessScope<'a> {
    pub(crate) fn new(buffers: &'a BufferSet, n_frames: u32) -> Self {
        ProcessScope { buffers, n_frames }
    }

    pub fn n_frames(&self) -> u32 {
        self.n_frames
    }

    /// Samples routed into `port` for this cycle. Empty if `port` has no
    /// buffer assigned (not currently connected and not requesting
    /// monitoring).
    pub fn audio_input(&self, port: PortId) -> &[f32] {
        self.buffers.read(port)
    }

    /// The buffer the client should fill for `port` before returning.
    ///
    /// # Safety
    /// Exclusive access for the duration of the cycle is guaranteed by the
    /// driver: a client's own ports are never read by anything else until
    /// after its callback returns.
    pub fn audio_output(&self, port: PortId) -> &mut [f32] {
        unsafe { self.buffers.write(port) }
    }
}

/// What a hosted client implements to take part in the realtime cycle
/// (§4.5, §6). Analogous to the original host library's process handler, cut
/// down to the one callback the core's cycle driver actually invokes.
pub trait ProcessCallback: Send {
    /// Must return within the cycle's soft deadline
    /// ([`crate::config::ServerConfig::soft_deadline`]); exceeding it is an
    /// overrun (§7, scenario 5), not a panic or error.
    fn process(&mut self, scope: &mut ProcessScope) -> Control;
}

/// Async notifications delivered on the control thread, never on the
/// realtime path (§4.6). A sink may do blocking or allocating work; none of
/// its methods are called from [`crate::driver::CycleDriver::run_cycle`].
#[allow(unused_variables)]
pub trait NotificationSink: Send {
    fn port_registered(&self, port: PortId, name: &str) {}
    fn port_unregistered(&self, port: PortId, name: &str) {}
    fn ports_connected(&self, source: PortId, destination: PortId) {}
    fn ports_disconnected(&self, source: PortId, destination: PortId) {}
    fn graph_reordered(&self) {}
    fn xrun(&self, client_name: &str) {}
    fn sample_rate_changed(&self, new_rate: u32) {}
    fn buffer_size_changed(&self, new_size: u32) {}
    fn client_shutdown(&self, client_name: &str, reason: &str) {}
}
